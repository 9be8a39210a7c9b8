use std::env;
use std::io::{self, Write};

use futures_util::StreamExt;
use minds_sdk::{Client, CreateMindOptions, DatabaseConfig, UpdateMindOptions};

// Run from the root folder of the repo as follows:
// MINDSDB_API_KEY=your-minds-key-here cargo run --example base_usage
// Optionally point at another deployment with MINDS_BASE_URL=https://...

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    minds_sdk::init_logger();

    let api_key = env::var("MINDSDB_API_KEY")
        .or_else(|_| env::var("MINDS_API_KEY"))
        .expect("Please set the MINDSDB_API_KEY environment variable!");
    let base_url = env::var("MINDS_BASE_URL").unwrap_or_default();
    let client = Client::with_base_url(&api_key, &base_url)?;

    // Describe the datasource
    let postgres_config = DatabaseConfig::new("my_datasource", "postgres")
        .with_description("House sales data")
        .with_connection("user", "demo_user")
        .with_connection("password", "demo_password")
        .with_connection("host", "samples.mindsdb.com")
        .with_connection("port", "5432")
        .with_connection("database", "demo")
        .with_connection("schema", "demo_data")
        .with_tables(["house_sales"]);

    // Create a mind with the datasource inline, replacing any earlier run
    let mut mind = client
        .minds
        .create(
            "mind_name",
            Some(CreateMindOptions::new().with_datasource(&postgres_config)),
            true,
        )
        .await?;
    println!("Created {} with datasources {:?}", mind, mind.datasources());

    // Or create the datasource first and attach it later
    let datasource = client.datasources.ensure(&postgres_config).await?;
    let mut second = client.minds.create("mind_name_2", None, true).await?;
    second.add_datasource(&datasource).await?;

    for listed in client.minds.list().await? {
        println!("- {} ({:?})", listed.name(), listed.model_name());
    }

    // Rename and retemplate in one call
    mind.update(UpdateMindOptions {
        name: Some("mind_name_renamed".to_string()),
        prompt_template: minds_sdk::Patch::Set("Answer in one sentence.".to_string()),
        ..Default::default()
    })
    .await?;

    println!("Buffered answer:");
    println!("{}", mind.completion("How many three-bedroom houses were sold in 2008?").await?);

    println!("Streaming answer:");
    println!("----------------------------");
    let mut stream = mind
        .completion_stream("What is the average price of those houses?")
        .await?;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(text) => {
                print!("{}", text);
                io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("\nError in stream: {}", e);
                break;
            }
        }
    }
    println!("\n\n[Stream complete]");

    // Clean up
    second.del_datasource(&datasource.name).await?;
    client.minds.drop("mind_name_2").await?;
    client.minds.drop(mind.name()).await?;
    client.datasources.drop("my_datasource").await?;

    Ok(())
}
