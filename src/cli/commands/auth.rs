use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_lockout_args(command);
    let command = with_otp_args(command);
    with_federated_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("HMAC signing secret for access and refresh tokens")
                .env("CREDO_TOKEN_SECRET"),
        )
        .arg(
            Arg::new("access-token-ttl-seconds")
                .long("access-token-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("CREDO_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-ttl-seconds")
                .long("refresh-token-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("CREDO_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("token-leeway-seconds")
                .long("token-leeway-seconds")
                .help("Clock-skew leeway accepted during token verification")
                .env("CREDO_TOKEN_LEEWAY_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_lockout_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("lockout-max-attempts")
                .long("lockout-max-attempts")
                .help("Wrong attempts tolerated before a lockout")
                .env("CREDO_LOCKOUT_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new("lockout-penalty-seconds")
                .long("lockout-penalty-seconds")
                .help("Lockout window applied after too many wrong attempts")
                .env("CREDO_LOCKOUT_PENALTY_SECONDS")
                .default_value("180")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("otp-ttl-seconds")
                .long("otp-ttl-seconds")
                .help("One-time code TTL in seconds")
                .env("CREDO_OTP_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-sweep-interval-seconds")
                .long("otp-sweep-interval-seconds")
                .help("Interval between expired-code sweeps")
                .env("CREDO_OTP_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_federated_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("google-audience")
                .long("google-audience")
                .help("Expected audience (client id) for Google ID tokens")
                .env("CREDO_GOOGLE_AUDIENCE"),
        )
        .arg(
            Arg::new("require-verified-email")
                .long("require-verified-email")
                .help("Require a verified email before a password can be set directly")
                .env("CREDO_REQUIRE_VERIFIED_EMAIL")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
}
