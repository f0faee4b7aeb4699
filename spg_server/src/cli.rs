use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets (webhook secrets, admin tokens, provider keys, the bot token) are deliberately not listed here
    const DISPLAY_ENVS: [&str; 23] = [
        "RUST_LOG",
        "SPG_HOST",
        "SPG_PORT",
        "SPG_DATABASE_URL",
        "SPG_KEY_NAMESPACE",
        "SPG_ORDER_TTL_SECS",
        "SPG_COMPLETED_RETENTION_SECS",
        "SPG_STALE_ORDER_MINUTES",
        "SPG_STALE_ORDER_ALERT_THRESHOLD",
        "SPG_MAPPING_MISS_THRESHOLD",
        "SPG_ALERT_THROTTLE_SECS",
        "SPG_MONITOR_INTERVAL_SECS",
        "SPG_PRICE_TABLE",
        "SPG_STORE_TIMEOUT_MS",
        "SPG_PROVIDER_TIMEOUT_MS",
        "SPG_USE_X_FORWARDED_FOR",
        "SPG_USE_FORWARDED",
        "SPG_TILL_NUMBER",
        "SPG_TILL_BUSINESS_NAME",
        "SPG_CRYPTO_DEPOSIT_ADDRESS",
        "SPG_CRYPTO_NETWORK",
        "SPG_CHECKOUT_BASE_URL",
        "SPG_EXCHANGE_BASE_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
