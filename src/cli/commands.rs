/// One line typed at the console prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Logout,
    Extend,
    Status,
    WhoAmI,
    Password { new_password: String, confirm_password: String },
    Help,
    Quit,
    Empty,
    /// Parsed keyword with missing or extra arguments; carries the usage hint.
    Usage(&'static str),
    Unknown(String),
}

pub const HELP: &str = "Commands:\n  login <user> <password>          sign in and start the session countdown\n  logout                           end the session\n  extend                           ask the server for a fresh session lifetime\n  status                           show session phase and time left\n  whoami                           show the signed-in user\n  password <new> <confirm>         replace the provisioned password\n  help                             show this help\n  quit | exit                      leave the console";

pub fn parse_command(line: &str) -> Command {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((head, args)) = parts.split_first() else { return Command::Empty };
    match head.to_ascii_lowercase().as_str() {
        "login" => match args {
            [user, pass] => Command::Login { username: user.to_string(), password: pass.to_string() },
            _ => Command::Usage("login <user> <password>"),
        },
        "password" => match args {
            [new, confirm] => Command::Password { new_password: new.to_string(), confirm_password: confirm.to_string() },
            _ => Command::Usage("password <new> <confirm>"),
        },
        "logout" if args.is_empty() => Command::Logout,
        "extend" if args.is_empty() => Command::Extend,
        "status" if args.is_empty() => Command::Status,
        "whoami" if args.is_empty() => Command::WhoAmI,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "logout" => Command::Usage("logout"),
        "extend" => Command::Usage("extend"),
        "status" => Command::Usage("status"),
        "whoami" => Command::Usage("whoami"),
        _ => Command::Unknown(head.to_string()),
    }
}
