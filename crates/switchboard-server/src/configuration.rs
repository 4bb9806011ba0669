use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use switchboard::config::Config;

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
}

impl Settings {
    pub fn new() -> anyhow::Result<Self> {
        let config = Config::global();
        let host = match config.get_param::<String>("SWITCHBOARD_SERVER__HOST") {
            Ok(raw) => raw.parse()?,
            Err(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };
        let port = config
            .get_param("SWITCHBOARD_SERVER__PORT")
            .unwrap_or(DEFAULT_PORT);
        Ok(Self { host, port })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_loopback() {
        let settings = Settings::new().unwrap();
        assert_eq!(settings.socket_addr().port(), DEFAULT_PORT);
        assert!(settings.socket_addr().ip().is_loopback());
    }
}
