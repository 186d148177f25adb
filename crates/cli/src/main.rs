use clap::{Parser, Subcommand};
use clinic_core::{
    config::{database_url_from_env_value, transaction_timeout_from_env_value},
    db, CatalogService, CoreConfig, MedicalRecord, MedicalRecordService, NewAction, NewMedicine,
    NonEmptyText,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic ledger CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Register a medicine in the catalog
    AddMedicine {
        /// Medicine name
        name: String,
        /// Unit price in minor currency units
        price: i64,
        /// Units in stock
        stock: i64,
    },
    /// Register a billable action in the catalog
    AddAction {
        /// Action name
        name: String,
        /// Price in minor currency units
        price: i64,
        /// Description (optional)
        #[arg(long)]
        description: Option<String>,
    },
    /// Overwrite a medicine's stock level
    SetStock {
        /// Medicine UUID
        medicine_id: Uuid,
        /// New stock level
        stock: i64,
    },
    /// Change a medicine's price (existing records keep their snapshot)
    SetPrice {
        /// Medicine UUID
        medicine_id: Uuid,
        /// New unit price in minor currency units
        price: i64,
    },
    /// Retire an action so it can no longer be billed
    RetireAction {
        /// Action UUID
        action_id: Uuid,
    },
    /// List all medical records
    List,
    /// Show one medical record with its line items
    Show {
        /// Medical record UUID
        id: Uuid,
    },
    /// Mark an unpaid medical record as paid and dispense its medicines
    MarkPaid {
        /// Medical record UUID
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'clinic --help' for commands");
        return Ok(());
    };

    let cfg = Arc::new(CoreConfig::new(
        database_url_from_env_value(std::env::var("DATABASE_URL").ok())?,
        transaction_timeout_from_env_value(std::env::var("CLINIC_TX_TIMEOUT_MS").ok())?,
    )?);
    let pool = db::connect(&cfg).await?;
    let catalog = CatalogService::new(pool.clone());
    let records = MedicalRecordService::new(cfg.clone(), pool.clone());

    match command {
        Commands::Migrate => {
            db::migrate(&pool).await?;
            println!("Migrations applied to {}", cfg.database_url());
        }
        Commands::AddMedicine { name, price, stock } => {
            let medicine = catalog
                .add_medicine(NewMedicine {
                    name: NonEmptyText::new(name)?,
                    price,
                    stock,
                })
                .await?;
            println!(
                "Registered medicine {} ({}, price {}, stock {})",
                medicine.id, medicine.name, medicine.price, medicine.stock
            );
        }
        Commands::AddAction {
            name,
            price,
            description,
        } => {
            let action = catalog
                .add_action(NewAction {
                    name: NonEmptyText::new(name)?,
                    price,
                    description,
                })
                .await?;
            println!(
                "Registered action {} ({}, price {})",
                action.id, action.name, action.price
            );
        }
        Commands::SetStock { medicine_id, stock } => {
            let stock = catalog.set_medicine_stock(medicine_id, stock).await?;
            println!("Medicine {} stock is now {}", medicine_id, stock);
        }
        Commands::SetPrice { medicine_id, price } => {
            let price = catalog.set_medicine_price(medicine_id, price).await?;
            println!("Medicine {} price is now {}", medicine_id, price);
        }
        Commands::RetireAction { action_id } => {
            catalog.retire_action(action_id).await?;
            println!("Retired action {}", action_id);
        }
        Commands::List => match records.list().await {
            Ok(records) => {
                for record in records {
                    println!(
                        "ID: {}, Booking: {}, Diagnosis: {}, Total: {}, Paid: {}, Created: {}",
                        record.id,
                        record.booking_id,
                        record.diagnosis_result,
                        record.total_amount,
                        record.payment_status,
                        record.created_at.to_rfc3339()
                    );
                }
            }
            Err(clinic_core::ClinicError::NoneFound(_)) => println!("No medical records found."),
            Err(e) => return Err(e.into()),
        },
        Commands::Show { id } => print_record(&records.get(id).await?),
        Commands::MarkPaid { id } => {
            let record = records.mark_paid(id).await?;
            println!("Marked medical record {} as paid", record.id);
            print_record(&record);
        }
    }

    Ok(())
}

fn print_record(record: &MedicalRecord) {
    println!("Medical record {}", record.id);
    println!("  Booking:   {}", record.booking_id);
    println!("  Diagnosis: {}", record.diagnosis_result);
    println!("  Created:   {}", record.created_at.to_rfc3339());
    println!("  Paid:      {}", record.payment_status);
    for line in &record.medicine_details {
        let live = line
            .current
            .as_ref()
            .map(|c| format!(" (now {} at {}, stock {})", c.name, c.price, c.stock))
            .unwrap_or_default();
        println!(
            "  Medicine {} x{} at {}{}",
            line.medicine_name, line.quantity, line.unit_price, live
        );
    }
    for line in &record.action_details {
        println!("  Action {} at {}", line.action_name, line.action_price);
    }
    println!(
        "  Totals: medicines {}, actions {}, total {}",
        record.total_medicine_amount, record.total_action_amount, record.total_amount
    );
}
