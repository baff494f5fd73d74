//! 설정 파일로 접속해 테이블 하나를 둘러보는 CLI 예제
//!
//! 사용법:
//! ```bash
//! cargo run --example quick_tour -- <config.toml> <table name> [SQL]
//! ```
//!
//! 예시:
//! ```bash
//! RUST_LOG=qdbapi=debug cargo run --example quick_tour -- qdb.toml Orders \
//!     "SELECT Customer, Amount FROM Orders ORDER BY Amount DESC LIMIT 5"
//! ```

use std::env;
use std::process::ExitCode;

use qdbapi::config::ClientConfig;
use qdbapi::schema::NameCase;
use qdbapi::sql::SqlResult;
use qdbapi::{Client, ClientEvent, Selector};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn print_usage() {
    eprintln!("테이블 둘러보기 CLI");
    eprintln!();
    eprintln!("사용법: quick_tour <config.toml> <table name> [SQL]");
    eprintln!();
    eprintln!("  config.toml  realm, app_token, username/password 또는 ticket");
    eprintln!("  table name   findDBByName으로 찾을 테이블 이름");
    eprintln!("  SQL          (선택) 실행할 SELECT 문");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let (config_path, table_name) = match args.as_slice() {
        [config, table, ..] => (config.as_str(), table.as_str()),
        _ => {
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(config_path, table_name, args.get(2).map(String::as_str)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: &str, table_name: &str, sql: Option<&str>) -> qdbapi::Result<()> {
    let config = ClientConfig::from_file(config_path)?;
    let mut client = Client::from_config(&config)?;
    client.subscribe(|event: &ClientEvent| {
        if let ClientEvent::TableChanged(table_id) = event {
            tracing::info!(table_id, "active table changed");
        }
    });

    if client.ticket().is_none() {
        if let (Some(user), Some(password)) = (config.username.as_deref(), config.password.as_deref()) {
            let auth = client.authenticate(user, password, None).await?;
            println!("signed in as {}", auth.user_id);
        }
    }

    let Some(table_id) = client.find_db_by_name(table_name).await? else {
        println!("no table named {table_name}");
        return Ok(());
    };
    let schema = client.get_schema(&table_id).await?;
    println!("{} ({table_id}): {}", schema.name, schema.description);
    for field in &schema.fields {
        println!("  {:>4}  {:<24} {}", field.id, field.label, field.field_type);
    }
    println!("reports: {}", schema.report_names().join(", "));
    println!("records: {}", client.get_num_records(&table_id).await?);

    match sql {
        Some(sql) => match client.do_sql_query(sql).await? {
            SqlResult::Count(n) => println!("count: {n}"),
            SqlResult::Rows(rows) => {
                for row in rows.rows() {
                    println!("{}", serde_json::to_string(&row)?);
                }
            }
        },
        None => {
            let names = schema.field_names(true, NameCase::AsIs);
            let json = client.records_as_json(&table_id, &names, &Selector::All).await?;
            println!("{json}");
        }
    }
    Ok(())
}
