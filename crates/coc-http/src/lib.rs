//! reqwest adapter for the Clash of Clans API.
//!
//! `auth` handles the developer-portal session and key selection, `dispatcher`
//! runs throttled endpoint calls, and `client` ties both behind typed methods.

pub mod auth;
pub mod client;
pub mod dispatcher;
pub mod egress;
pub mod endpoints;

pub use client::CocClient;

use coc_core::errors::Error;

/// Map a reqwest failure to a transport error, keeping its source chain.
pub(crate) fn transport_error(e: reqwest::Error) -> Error {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(&e);
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    Error::Transport(msg)
}

#[cfg(test)]
pub(crate) mod log_capture {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    #[derive(Clone, Default)]
    pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        /// Route this thread's events into the buffer until the guard drops.
        pub fn install(&self) -> tracing::subscriber::DefaultGuard {
            let buf = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .with_writer(move || buf.clone())
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
