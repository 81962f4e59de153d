use anyhow::{Result, bail};
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

/// Reads the master password.
///
/// Sources, in order: the `KPCORE_PASSWORD` environment variable (also
/// filled from `.env`), one line of piped stdin, an interactive prompt.
pub fn read_password() -> Result<Zeroizing<String>> {
    //  KPCORE_PASSWORD="supersecret" kpcore transform --seed ...
    if let Ok(pw) = std::env::var("KPCORE_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    //  echo "supersecret" | kpcore transform --seed ...
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    } else {
        let pw = Zeroizing::new(rpassword::prompt_password("Master password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("No password provided")
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
