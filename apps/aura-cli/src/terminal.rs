//! Terminal implementations of the client's UI seams.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use aura_client::{GatewayOutcome, GatewayRequest, Navigator, Notifier, PaymentGateway, ToastKind};
use aura_core::Money;

/// Stands in for the hosted payment widget.
///
/// Prints what the widget would be opened with and waits for the payment
/// reference. A blank line means the widget was closed.
#[derive(Debug, Default)]
pub struct TerminalGateway;

#[async_trait]
impl PaymentGateway for TerminalGateway {
    async fn open(&self, request: GatewayRequest) -> GatewayOutcome {
        println!();
        println!("Payment widget");
        println!("  key        {}", request.public_key);
        println!("  amount     {} ({} {})", Money::from_minor(request.amount), request.amount, request.currency);
        println!("  email      {}", request.email);
        println!("  access     {}", request.access_code);
        println!("  reference  {}", request.reference);
        println!();

        let answer =
            tokio::task::spawn_blocking(|| prompt("Payment reference (blank to close): ")).await;
        match answer {
            Ok(Ok(line)) if line.trim().is_empty() => GatewayOutcome::Closed,
            Ok(Ok(line)) => GatewayOutcome::Paid {
                reference: line.trim().to_string(),
            },
            Ok(Err(e)) => GatewayOutcome::Failed {
                message: e.to_string(),
            },
            Err(e) => GatewayOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: &str) {
        eprintln!("→ {}", route);
    }
}

#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: ToastKind, message: &str) {
        eprintln!("[{}] {}", kind, message);
    }
}

/// Prints `label` and reads one line from stdin.
pub fn prompt(label: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(label.as_bytes())?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
