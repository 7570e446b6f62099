use std::net::SocketAddr;

use crate::JsonApiError;

pub fn format_socket_address(host: &str, port: u16) -> crate::Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse::<SocketAddr>()
        .map_err(|err| {
            JsonApiError::Configuration(format!("invalid listen address {}:{}: {}", host, port, err))
        })
}

/// Cut `text` down to `length` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, length: usize) -> String {
    if text.chars().count() <= length {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(length).collect();
    truncated.push_str("...");
    truncated
}
