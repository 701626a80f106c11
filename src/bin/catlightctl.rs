use std::io::Write;
use std::net::TcpStream;
use std::process::ExitCode;

use catlight::effectspec::parse_effect;
use clap::Parser;

#[derive(Parser)]
#[command(name = "catlightctl", about = "Sends light effects to catlightd")]
struct Cli {
    /// Host of catlightd
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port of catlightd
    #[arg(short, long, default_value_t = 3333)]
    port: u16,

    /// Effects to play, e.g. `c{255,0,0}` or `flash{100ms|255,0,0|3}`
    #[arg(required = true, value_name = "EFFECT")]
    effects: Vec<String>,

    /// Send effects even if they do not parse locally
    #[arg(long)]
    no_check: bool,
}

/// Rejects the whole batch up front, the daemon would silently drop the
/// connection at the first bad line anyway.
fn check_effects(effects: &[String]) -> Result<(), String> {
    for effect in effects {
        if let Err(err) = parse_effect(effect) {
            return Err(format!("Refusing to send `{effect}`: {err}"));
        }
    }
    Ok(())
}

fn send_effects<W: Write>(conn: &mut W, effects: &[String]) -> Result<(), String> {
    for effect in effects {
        let line = format!("{}\n", effect.trim());
        if let Err(err) = conn.write_all(line.as_bytes()) {
            return Err(format!("Cannot send effect `{effect}`: {err}"));
        }
    }

    conn.flush().map_err(|err| err.to_string())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Cli::parse();

    if !args.no_check {
        if let Err(msg) = check_effects(&args.effects) {
            log::error!("{msg}");
            return ExitCode::from(2);
        }
    }

    let addr = format!("{}:{}", args.host, args.port);
    let mut conn = match TcpStream::connect(&addr) {
        Ok(conn) => conn,
        Err(err) => {
            log::error!("Unable to connect to `catlightd` at {addr}: {err}");
            return ExitCode::from(1);
        }
    };

    if let Err(msg) = send_effects(&mut conn, &args.effects) {
        log::error!("{msg}");
        return ExitCode::from(1);
    }

    log::debug!("Sent {} effect(s) to {addr}", args.effects.len());
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_per_effect() {
        let mut out: Vec<u8> = Vec::new();
        let effects = vec!["c{1,2,3}".to_string(), " fade{4ms|255,0,0|1}".to_string()];
        send_effects(&mut out, &effects).unwrap();
        assert_eq!(out, b"c{1,2,3}\nfade{4ms|255,0,0|1}\n");
    }

    #[test]
    fn local_check_catches_typos() {
        let good = vec!["c{1,2,3}".to_string(), "flash{1s|1,2,3|2}".to_string()];
        assert!(check_effects(&good).is_ok());

        let bad = vec!["c{1,2,3}".to_string(), "flesh{1s|1,2,3|2}".to_string()];
        let msg = check_effects(&bad).unwrap_err();
        assert!(msg.contains("flesh"));
    }

    #[test]
    fn needs_at_least_one_effect() {
        assert!(Cli::try_parse_from(["catlightctl"]).is_err());
        let cli = Cli::try_parse_from(["catlightctl", "-p", "4000", "c{0,0,0}"]).unwrap();
        assert_eq!(cli.port, 4000);
        assert_eq!(cli.host, "localhost");
    }
}
