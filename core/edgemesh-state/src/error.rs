/// Errors raised while recording events or decoding remote state into a
/// composite [`crate::NodeState`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("counter amount must be non-negative, got {0}")]
    InvalidAmount(i64),

    #[error("state payload could not be decoded: {0}")]
    StateDecodeError(String),
}

impl From<edgemesh_crdt::Error> for Error {
    fn from(err: edgemesh_crdt::Error) -> Self {
        match err {
            edgemesh_crdt::Error::InvalidAmount(amount) => Error::InvalidAmount(amount),
        }
    }
}
