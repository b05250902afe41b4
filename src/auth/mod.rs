//! Session cookies and login credential handling for the password client.

mod encrypt;
mod session;

pub use encrypt::{PasswordEncryptor, RsaPasswordEncryptor};
pub use session::Session;
