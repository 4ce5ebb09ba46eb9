//! Response framing
//!
//! With `ResponseHeader: fixed16` every response starts with a 16 byte line:
//! a three digit status code, a space, the body length right aligned in 11
//! characters, and a newline. An error replaces the whole body with its
//! message.

use crate::error::LqlError;
use crate::parser::ResponseHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Ok = 200,
    BadRequest = 400,
    NotFound = 404,
    LimitExceeded = 413,
    IncompleteRequest = 451,
    InvalidRequest = 452,
    InternalError = 500,
    BadGateway = 502,
}

impl ResponseCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl From<&LqlError> for ResponseCode {
    fn from(error: &LqlError) -> Self {
        match error {
            LqlError::BadRequest(_) => ResponseCode::BadRequest,
            LqlError::TableNotFound(_) => ResponseCode::NotFound,
            LqlError::InvalidMethod(_) => ResponseCode::InvalidRequest,
            LqlError::IncompleteRequest(_) => ResponseCode::IncompleteRequest,
            LqlError::LimitExceeded(_) => ResponseCode::LimitExceeded,
            LqlError::Gateway(_) => ResponseCode::BadGateway,
            LqlError::Internal(_)
            | LqlError::InvalidSnapshot(_)
            | LqlError::Config(_)
            | LqlError::IoError(_) => ResponseCode::InternalError,
        }
    }
}

/// Body and status of one response
#[derive(Debug)]
pub struct OutputBuffer {
    response_header: ResponseHeader,
    code: ResponseCode,
    body: String,
    error: Option<String>,
}

impl OutputBuffer {
    pub fn new(response_header: ResponseHeader) -> Self {
        Self {
            response_header,
            code: ResponseCode::Ok,
            body: String::new(),
            error: None,
        }
    }

    pub fn set_response_header(&mut self, response_header: ResponseHeader) {
        self.response_header = response_header;
    }

    pub fn push_str(&mut self, text: &str) {
        self.body.push_str(text);
    }

    /// Record an error; only the first one is reported
    pub fn set_error(&mut self, error: &LqlError) {
        if self.error.is_none() {
            self.code = ResponseCode::from(error);
            self.error = Some(error.to_string());
        }
    }

    pub fn code(&self) -> ResponseCode {
        self.code
    }

    /// The bytes to send to the client
    pub fn finish(self) -> String {
        let body = match self.error {
            Some(message) => format!("{}\n", message),
            None => self.body,
        };
        match self.response_header {
            ResponseHeader::Off => body,
            ResponseHeader::Fixed16 => {
                format!("{:03} {:>11}\n{}", self.code.code(), body.len(), body)
            }
        }
    }
}
