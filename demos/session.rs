//! Walk through one session: authenticate, run each operation, log out.
//!
//! ```text
//! cargo run --example session -- <text|json|binary> <student-id> [host] [port]
//! RUST_LOG=triwire_client=debug cargo run --example session -- json 554576
//! ```

use std::error::Error;

use tracing_subscriber::EnvFilter;
use triwire_client::codec::{BinaryCodec, Codec, JsonCodec, TextCodec};
use triwire_client::{Encoding, Fields, SessionBuilder};

fn print_fields(label: &str, fields: &Fields) {
    println!("{label}:");
    for (key, value) in fields {
        println!("  {key} = {value}");
    }
}

async fn run<C: Codec>(builder: SessionBuilder, codec: C, student_id: &str) -> Result<(), Box<dyn Error>> {
    let mut session = builder.connect(codec).await?;

    let student = session.authenticate(student_id).await?;
    print_fields("authenticated", &student);

    print_fields("echo", &session.echo("olá, servidor").await?);
    print_fields("soma", &session.soma(&[15.5, 25.3, 30.7, 45.2]).await?);
    print_fields("timestamp", &session.timestamp().await?);
    print_fields("status", &session.status(true).await?);
    print_fields("historico", &session.historico(10).await?);

    if session.logout().await? {
        println!("logged out");
    }
    session.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let mut args = std::env::args().skip(1);
    let (Some(encoding), Some(student_id)) = (args.next(), args.next()) else {
        eprintln!("usage: session <text|json|binary> <student-id> [host] [port]");
        std::process::exit(2);
    };
    let encoding: Encoding = encoding.parse()?;

    let mut builder = SessionBuilder::new();
    if let Some(host) = args.next() {
        builder = builder.host(host);
    }
    if let Some(port) = args.next() {
        builder = builder.port(port.parse()?);
    }

    match encoding {
        Encoding::Text => run(builder, TextCodec, &student_id).await,
        Encoding::Json => run(builder, JsonCodec, &student_id).await,
        Encoding::Binary => run(builder, BinaryCodec, &student_id).await,
    }
}
