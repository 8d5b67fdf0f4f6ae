//! Chrome DevTools Protocol client.
//!
//! A thin CDP implementation sized for what the automation session needs:
//! connect to a launched Chromium, open one page, navigate, evaluate
//! JavaScript, capture screenshots, and surface page console/exception
//! events into tracing.

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::{BrowserVersion, CdpRequest, CdpResponse, PageInfo};
pub use session::PageSession;
