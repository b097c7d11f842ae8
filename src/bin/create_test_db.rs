use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;

use ledger_rs::{DbSettings, SessionFactory, Transaction, insert_transaction};

/// A utility for creating a test database for the REST API server of ledger_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The number of transactions to create.
    #[arg(long, short, default_value_t = 150)]
    count: u32,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let factory = SessionFactory::new(&args.output_path, DbSettings::default())?;

    println!("Creating {} transactions...", args.count);
    let categories = ["food", "rent", "transport", "salary"];
    let session = factory.session()?;

    for i in 0..args.count {
        let category = categories[i as usize % categories.len()];
        let is_income = category == "salary";
        let amount = if is_income { 2500.0 } else { 10.0 + f64::from(i % 90) };
        let day = i % 28 + 1;

        let transaction = Transaction::build(amount)
            .category(category)
            .description(&format!("Test transaction #{}", i + 1))
            .is_income(is_income)
            .date(&format!("2024-01-{day:02}"));

        insert_transaction(transaction, session.connection()?)?;
    }

    session.commit()?;

    println!("Success!");

    Ok(())
}
