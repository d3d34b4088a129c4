use std::net::TcpListener;

use rand::Rng;

pub mod error;
pub mod media;
pub mod urls;

/// Default port the API listens on when `REEL_PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

pub struct AddrInfo {
    pub addr: String,
    pub port: u16,
    pub https: bool,
}

impl AddrInfo {
    pub fn as_url(&self) -> String {
        let scheme = match self.https {
            true => "https",
            false => "http",
        };
        format!("{}://{}:{}", scheme, self.addr, self.port)
    }

    pub fn as_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    /// The origin used for absolute media URLs when no public base URL is configured.
    pub fn as_local_url(&self) -> String {
        let scheme = match self.https {
            true => "https",
            false => "http",
        };
        format!("{}://localhost:{}", scheme, self.port)
    }

    pub fn from_env() -> Self {
        let https = match std::env::var("REEL_HTTPS") {
            Ok(val) => val == "true",
            Err(_) => false,
        };

        let port: u16 = match std::env::var("REEL_PORT") {
            Ok(val) => val.parse().unwrap_or(DEFAULT_PORT),
            Err(_) => DEFAULT_PORT,
        };

        Self {
            addr: std::env::var("REEL_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            https,
        }
    }

    pub fn test() -> Self {
        // select a random port
        let mut rng = rand::rng();

        let mut port: u16 = rng.random_range(32768..65535);
        while TcpListener::bind(format!("127.0.0.1:{}", port)).is_err() {
            port = rng.random_range(32768..65535);
        }

        Self {
            https: false,
            addr: "127.0.0.1".to_string(),
            port,
        }
    }
}
