//! Interactive companion tool for SecureLog:
//! 1. generate an SM2 key pair (Base64, saved to timestamped files)
//! 2. decrypt SECURE_DATA tokens with a Base64 PKCS#8 private key
//!
//! `exit` / `quit` leaves the menu.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Stdin, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use securelog::SecureDataDecrypter;
use securelog_core::{ConfigSnapshot, PropertyBag};
use securelog_crypto::sm2::{self, Sm2Decryptor};
use securelog_crypto::public_key_fingerprint;

const DECRYPT_OUTPUT_FILE: &str = "sm2_decrypt_output.txt";

#[derive(Parser, Debug)]
#[command(name = "securelog-cli", version, about = "SecureLog key-pair and SECURE_DATA tool")]
struct Cli {
    /// Property file path (defaults to ./securelog-ecc.properties)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let props = match &cli.config {
        Some(path) => PropertyBag::load_from(path)?,
        None => PropertyBag::load(),
    };
    let config = ConfigSnapshot::from_properties(&props);
    let decrypter = SecureDataDecrypter::from_config(&config);

    let stdin = std::io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        let choice = match prompt(&mut reader, "Choose: 1=generate SM2 key pair  2=decrypt SECURE_DATA  (exit/quit to leave)")? {
            Some(line) => line,
            None => return Ok(()),
        };
        let choice = choice.trim();
        if is_exit(choice) {
            println!("Bye.");
            return Ok(());
        }
        match choice {
            "1" => handle_generate()?,
            "2" => handle_decrypt(&mut reader, &config, &decrypter)?,
            _ => println!("Invalid input; enter 1 or 2, or exit/quit."),
        }
    }
}

fn handle_generate() -> Result<()> {
    let pair = sm2::generate_key_pair()?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let public_path = PathBuf::from(format!("sm2_public_key_{timestamp}.txt"));
    let private_path = PathBuf::from(format!("sm2_private_key_{timestamp}.txt"));

    std::fs::write(&public_path, &pair.public_key_base64)?;
    std::fs::write(&private_path, &pair.private_key_base64)?;

    println!("Public key (Base64):\n{}", pair.public_key_base64);
    println!("Private key (Base64):\n{}", pair.private_key_base64);
    if let Some(fingerprint) = public_key_fingerprint(&pair.public_key_base64) {
        let fingerprint_path = PathBuf::from(format!("sm2_fingerprint_{timestamp}.txt"));
        std::fs::write(&fingerprint_path, &fingerprint)?;
        println!("Fingerprint (Base64):\n{fingerprint}");
    }
    println!("Keys saved to:");
    println!("  {}", public_path.display());
    println!("  {}", private_path.display());
    println!("Store the private key carefully; it is the only way to read SECURE_DATA.");
    Ok(())
}

fn handle_decrypt(
    reader: &mut BufReader<Stdin>,
    config: &ConfigSnapshot,
    decrypter: &SecureDataDecrypter,
) -> Result<()> {
    let sm2_decryptor = loop {
        let input = match prompt(reader, "Private key for decryption (Base64 PKCS#8):")? {
            Some(line) => line,
            None => return Ok(()),
        };
        let trimmed = input.trim();
        if trimmed.is_empty() {
            println!("The private key must not be empty.");
            continue;
        }
        match Sm2Decryptor::from_base64(trimmed, &config.sm2_transformation) {
            Ok(d) => break d,
            Err(_) => println!("Invalid private key; paste the Base64 PKCS#8 form."),
        }
    };

    loop {
        let input = match prompt(reader, "SECURE_DATA to decrypt (Base64):")? {
            Some(line) => line,
            None => return Ok(()),
        };
        let secure_data = input.trim();
        if secure_data.is_empty() {
            println!("SECURE_DATA must not be empty.");
        } else {
            decrypt_once(decrypter, secure_data, &sm2_decryptor)?;
        }

        let again = match prompt(reader, "Decrypt another? ('c' to continue, anything else to leave)")? {
            Some(line) => line,
            None => return Ok(()),
        };
        if !again.trim().eq_ignore_ascii_case("c") {
            return Ok(());
        }
    }
}

fn decrypt_once(
    decrypter: &SecureDataDecrypter,
    secure_data: &str,
    sm2_decryptor: &Sm2Decryptor,
) -> Result<()> {
    match decrypter.decrypt_with(secure_data, sm2_decryptor) {
        Ok(plaintext) => {
            println!("Plaintext: {plaintext}");
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(DECRYPT_OUTPUT_FILE)?;
            writeln!(file, "{plaintext}\n")?;
            println!("Appended to {DECRYPT_OUTPUT_FILE}");
            println!();
        }
        Err(e) => println!("Decryption failed ({e}); check the private key and SECURE_DATA."),
    }
    Ok(())
}

fn prompt(reader: &mut BufReader<Stdin>, message: &str) -> Result<Option<String>> {
    println!("{message}");
    let mut line = String::new();
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}
