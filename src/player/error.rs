use thiserror::Error;

/// Errors reported by [`Player::play`](super::Player::play).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// The audio output could not be opened or resumed.
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),

    /// The player was disposed; it can't be started again.
    #[error("player has been disposed")]
    Disposed,
}
