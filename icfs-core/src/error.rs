use thiserror::Error;

/// HTTP-style status class attached to every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    BadRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl StatusClass {
    pub fn code(self) -> u16 {
        match self {
            StatusClass::BadRequest => 400,
            StatusClass::Unauthorized => 401,
            StatusClass::PaymentRequired => 402,
            StatusClass::Forbidden => 403,
            StatusClass::NotFound => 404,
            StatusClass::Conflict => 409,
            StatusClass::Internal => 500,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn status(&self) -> StatusClass {
        match self {
            LedgerError::BadRequest(_) => StatusClass::BadRequest,
            LedgerError::Unauthorized(_) => StatusClass::Unauthorized,
            LedgerError::PaymentRequired(_) => StatusClass::PaymentRequired,
            LedgerError::Forbidden(_) => StatusClass::Forbidden,
            LedgerError::NotFound(_) => StatusClass::NotFound,
            LedgerError::Conflict(_) => StatusClass::Conflict,
            LedgerError::Internal(_) => StatusClass::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status().code()
    }

    pub fn message(&self) -> &str {
        match self {
            LedgerError::BadRequest(msg)
            | LedgerError::Unauthorized(msg)
            | LedgerError::PaymentRequired(msg)
            | LedgerError::Forbidden(msg)
            | LedgerError::NotFound(msg)
            | LedgerError::Conflict(msg)
            | LedgerError::Internal(msg) => msg,
        }
    }

    /// Prefix the message with operation context, keeping the status class.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        let wrap = |msg: String| format!("{context}: {msg}");
        match self {
            LedgerError::BadRequest(msg) => LedgerError::BadRequest(wrap(msg)),
            LedgerError::Unauthorized(msg) => {
                LedgerError::Unauthorized(wrap(msg))
            }
            LedgerError::PaymentRequired(msg) => {
                LedgerError::PaymentRequired(wrap(msg))
            }
            LedgerError::Forbidden(msg) => LedgerError::Forbidden(wrap(msg)),
            LedgerError::NotFound(msg) => LedgerError::NotFound(wrap(msg)),
            LedgerError::Conflict(msg) => LedgerError::Conflict(wrap(msg)),
            LedgerError::Internal(msg) => LedgerError::Internal(wrap(msg)),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Attach operation context to any fallible store call.
pub trait ResultExt<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|err| err.context(context))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            // 23505 unique_violation, 23503 foreign_key_violation
            match db_err.code().as_deref() {
                Some("23505") => {
                    return LedgerError::Conflict(format!(
                        "unique constraint {} violated",
                        db_err.constraint().unwrap_or("<unnamed>")
                    ));
                }
                Some("23503") => {
                    return LedgerError::Conflict(format!(
                        "row still referenced ({})",
                        db_err.constraint().unwrap_or("<unnamed>")
                    ));
                }
                _ => {}
            }
        }
        LedgerError::Internal(err.to_string())
    }
}
