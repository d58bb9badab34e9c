use std::fmt;

pub type Result<T> = std::result::Result<T, XtaskError>;

#[derive(Debug)]
pub enum XtaskError {
    Message(String),
}

impl fmt::Display for XtaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XtaskError::Message(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for XtaskError {}
