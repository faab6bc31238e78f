use std::fmt;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser)]
pub struct Args {
    /// The address the server should listen on. By default
    /// it listens just on the IPv4 loopback.
    #[arg(short, long, env = "GAMEBUDGET_ADDRESS")]
    address: Option<String>,

    /// The port the server listens on.
    #[arg(short, long, env = "GAMEBUDGET_PORT", default_value_t = 3000)]
    port: u16,

    /// Directory holding the database.
    #[arg(short, long, env = "GAMEBUDGET_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Key used to sign and verify session tokens.
    #[arg(long, env = "GAMEBUDGET_SECRET", hide_env_values = true)]
    secret: String,

    /// Lifetime of session tokens, in seconds. Tokens never expire
    /// when unset.
    #[arg(long, env = "GAMEBUDGET_TOKEN_TTL")]
    token_ttl: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a user, then exit.
    AddUser {
        #[arg(long)]
        login: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        password: String,

        /// Give the user access to the admin panel.
        #[arg(long)]
        admin: bool,
    },
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("command", &self.command)
            .finish()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddUser {
                login, name, admin, ..
            } => f
                .debug_struct("AddUser")
                .field("login", login)
                .field("name", name)
                .field("password", &"<redacted>")
                .field("admin", admin)
                .finish(),
        }
    }
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    pub fn token_ttl(&self) -> Option<Duration> {
        self.token_ttl.map(Duration::from_secs)
    }

    pub fn take_command(&mut self) -> Option<Command> {
        self.command.take()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_user_command() {
        let mut args = Args::try_parse_from([
            "gamebudget",
            "--secret",
            "s3cret",
            "add-user",
            "--login",
            "nikita",
            "--name",
            "Nikita",
            "--password",
            "pw",
            "--admin",
        ])
        .unwrap();

        assert_eq!(args.secret(), b"s3cret");
        assert!(matches!(
            args.take_command(),
            Some(Command::AddUser { admin: true, .. })
        ));
    }

    #[test]
    fn debug_hides_credentials() {
        let args = Args::try_parse_from([
            "gamebudget",
            "--secret",
            "s3cret",
            "add-user",
            "--login",
            "nikita",
            "--name",
            "Nikita",
            "--password",
            "hunter2",
        ])
        .unwrap();

        let shown = format!("{args:?}");
        assert!(shown.contains("nikita"));
        assert!(!shown.contains("s3cret"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["gamebudget", "--secret", "x", "--token-ttl", "60"]).unwrap();

        assert_eq!(args.addr().unwrap(), "127.0.0.1:3000".parse().unwrap());
        assert_eq!(args.token_ttl(), Some(Duration::from_secs(60)));
    }
}
