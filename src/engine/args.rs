use borsh::{BorshDeserialize, BorshSerialize};

// Argument and result layouts of the engine contract's view methods.

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct GetStorageAtArgs {
    pub address: [u8; 20],
    pub key: [u8; 32],
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct ViewCallArgs {
    pub sender: [u8; 20],
    pub address: [u8; 20],
    /// Big-endian wei amount.
    pub amount: [u8; 32],
    pub input: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum TransactionStatus {
    Succeed(Vec<u8>),
    Revert(Vec<u8>),
    OutOfGas,
    OutOfFund,
    OutOfOffset,
    CallTooDeep,
}
