use std::net::{Ipv4Addr, SocketAddr};

use crate::config::ApiSettings;

const BIND_ADDR: &str = "STATS_BIND_ADDR";

const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
    8080,
);

pub fn get_default_bind_addr() -> SocketAddr {
    DEFAULT_BIND_ADDR
}

pub fn get_bind_addr(configured: SocketAddr) -> SocketAddr {
    let addr_from_env = std::env::var(BIND_ADDR);
    addr_from_env.map_or(configured, |res| res.parse().unwrap_or(configured))
}

const ADMIN_TOKEN: &str = "STATS_ADMIN_TOKEN";

pub fn get_admin_token(configured: Option<String>) -> Option<String> {
    let token_from_env = std::env::var(ADMIN_TOKEN);
    token_from_env
        .ok()
        .filter(|token| !token.is_empty())
        .or(configured)
}

/// Apply environment overrides to the API settings from the config file
pub fn resolve_api_settings(settings: ApiSettings) -> ApiSettings {
    ApiSettings {
        bind_addr: get_bind_addr(settings.bind_addr),
        admin_token: get_admin_token(settings.admin_token),
        ..settings
    }
}
