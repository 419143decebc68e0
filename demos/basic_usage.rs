//! Basic usage example for mailsink
//!
//! Starts a capture server that only relays mail for `example.com`, sends one
//! message to an accepted recipient and one to a rejected recipient, and
//! prints what the observers saw.

use mailsink::capture::{CaptureConfig, IngestionOutcome, MailIngestor};
use mailsink::{SmtpServer, logging};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("mailsink Basic Usage Example");
    println!("============================");

    let mut config = CaptureConfig::default();
    config.relay.domains = vec!["example.com".to_string()];
    logging::init(&config.logging);

    let ingestor = Arc::new(MailIngestor::from_config(&config)?);
    let (_subscription, rx) = ingestor.hub().subscribe_channel();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?.to_string();
    let server = SmtpServer::new("example.local", Arc::clone(&ingestor));
    thread::spawn(move || {
        if let Err(e) = server.start_with_listener(listener) {
            eprintln!("Server error: {e}");
        }
    });
    println!("Server started on {addr}");

    println!("\nSending test emails...");
    send_email(&addr, "recipient@example.com", "Test Email from mailsink")?;
    send_email(&addr, "someone@elsewhere.org", "Outside the relay domains")?;

    println!("\nCollecting outcomes...");
    while let Ok(outcome) = rx.recv_timeout(Duration::from_millis(200)) {
        let record = outcome.record();
        let status = match outcome {
            IngestionOutcome::Accepted(_) => "accepted",
            IngestionOutcome::Rejected(_) => "rejected",
        };
        println!("[{status}] {} -> {}", record.sender(), record.recipient());
        println!("  Subject: {}", record.subject());
        println!("  Received at: {}", record.received_at());
        for line in record.body().lines() {
            println!("    {line}");
        }
    }

    // Holding the lock keeps accepted notifications out while the mailbox is cleared.
    let _guard = ingestor.lock();
    println!("\nMailbox cleared");

    Ok(())
}

fn send_email(addr: &str, to: &str, subject: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(addr)?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut expect = |stream: &mut TcpStream, line: Option<&str>| -> std::io::Result<()> {
        if let Some(line) = line {
            write!(stream, "{line}\r\n")?;
        }
        let mut response = String::new();
        reader.read_line(&mut response)?;
        print!("S: {response}");
        Ok(())
    };

    expect(&mut stream, None)?;
    expect(&mut stream, Some("HELO client.example.com"))?;
    expect(&mut stream, Some("MAIL FROM:<sender@example.com>"))?;
    expect(&mut stream, Some(&format!("RCPT TO:<{to}>")))?;
    expect(&mut stream, Some("DATA"))?;

    write!(stream, "From: sender@example.com\r\n")?;
    write!(stream, "To: {to}\r\n")?;
    write!(stream, "Subject: {subject}\r\n\r\n")?;
    write!(stream, "This is a test email sent to demonstrate\r\n")?;
    write!(stream, "the mailsink capture pipeline.\r\n")?;
    expect(&mut stream, Some("."))?;
    expect(&mut stream, Some("QUIT"))?;

    Ok(())
}
