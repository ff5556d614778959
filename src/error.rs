use thiserror::Error;

use crate::message::{ProposalNumber, Reply};

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid endpoint `{0}`, expected host:port")]
    Endpoint(String),

    #[error("remote call timed out")]
    CallTimeout,

    #[error("connection closed before a reply arrived")]
    Disconnected,

    #[error("rejected, acceptor has promised {promised:?}")]
    Rejected { promised: Option<ProposalNumber> },

    #[error("unexpected reply {0:?}")]
    UnexpectedReply(Box<Reply>),

    #[error("no agreement after {attempts} attempts")]
    Timeout { attempts: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
