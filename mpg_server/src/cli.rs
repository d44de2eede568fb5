use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "MPG_HOST",
        "MPG_PORT",
        "MPG_DATABASE_URL",
        "MPG_CALLBACK_HMAC_CHECKS",
        "MPG_CALLBACK_IP_WHITELIST",
        "MPG_USE_X_FORWARDED_FOR",
        "MPG_USE_FORWARDED",
        "MPG_AMOUNT_TOLERANCE",
        "MPG_MAX_CONFLICT_RETRIES",
        "MPG_MPESA_ENV",
        "MPG_MPESA_BASE_URL",
        "MPG_MPESA_SHORTCODE",
        "MPG_MPESA_TRANSACTION_TYPE",
        "MPG_MPESA_CALLBACK_URL",
        "MPG_MPESA_COUNTRY_CODE",
        "MPG_MPESA_TIMEOUT_SECS",
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
