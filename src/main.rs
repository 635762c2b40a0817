// 🕌 mosque-dues CLI
//
// Usage:
//   mosque-dues init
//   mosque-dues import-donors <donors.csv>
//   mosque-dues import-income <income.csv>
//   mosque-dues missing <donor-id>
//   mosque-dues paid <donor-id>
//   mosque-dues report
//   mosque-dues audit [--apply]
//   mosque-dues notices
//   mosque-dues quality

use anyhow::{bail, Context, Result};
use mosque_dues::{
    get_all_payments, insert_donors, insert_payments, load_all_donors, load_donors_csv,
    load_income_csv, setup_database, update_donor_status, verify_counts, Clock,
    DataQualityEngine, DuesConfig, DuesError, DuesService, SqliteRepository, SystemClock,
};
use rusqlite::Connection;
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = DuesConfig::load()?;

    let command = args.get(1).map(String::as_str).unwrap_or("help");
    match command {
        "init" => run_init(&config),
        "import-donors" => run_import_donors(&config, required_arg(&args, "donors.csv")?),
        "import-income" => run_import_income(&config, required_arg(&args, "income.csv")?),
        "missing" => run_missing(&config, required_arg(&args, "donor-id")?),
        "paid" => run_paid(&config, required_arg(&args, "donor-id")?),
        "report" => run_report(&config),
        "audit" => run_audit(&config, args.iter().any(|a| a == "--apply")),
        "notices" => run_notices(&config),
        "quality" => run_quality(&config),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn required_arg<'a>(args: &'a [String], name: &str) -> Result<&'a str> {
    match args.get(2) {
        Some(value) => Ok(value.as_str()),
        None => bail!("Missing argument <{}> for '{}'", name, args[1]),
    }
}

fn print_usage() {
    println!("🕌 mosque-dues {}", mosque_dues::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  init                      Create the database");
    println!("  import-donors <csv>       Import or update donors");
    println!("  import-income <csv>       Import income (re-import safe)");
    println!("  missing <donor-id>        Months with no monthly donation");
    println!("  paid <donor-id>           Months with a monthly donation");
    println!("  report                    Outstanding dues for all donors");
    println!("  audit [--apply]           Compare stored and suggested status");
    println!("  notices                   Print dues notices");
    println!("  quality                   Check donor and income records");
}

fn open_database(config: &DuesConfig) -> Result<Connection> {
    let conn = Connection::open(&config.database_path).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })?;
    setup_database(&conn)?;
    Ok(conn)
}

fn run_init(config: &DuesConfig) -> Result<()> {
    println!("🔧 Setting up database...");
    let conn = open_database(config)?;
    let (donors, income) = verify_counts(&conn)?;
    println!("✓ {} ready (WAL mode)", config.database_path.display());
    println!("✓ {} donors, {} income rows", donors, income);
    Ok(())
}

fn run_import_donors(config: &DuesConfig, csv_path: &str) -> Result<()> {
    println!("📂 Loading donors from {}...", csv_path);
    let donors = load_donors_csv(Path::new(csv_path))?;
    println!("✓ Loaded {} donors from CSV", donors.len());

    let conn = open_database(config)?;
    let written = insert_donors(&conn, &donors)?;
    let (total, _) = verify_counts(&conn)?;

    println!("💾 Wrote {} donors", written);
    println!("✅ Database contains {} donors", total);
    Ok(())
}

fn run_import_income(config: &DuesConfig, csv_path: &str) -> Result<()> {
    println!("📂 Loading income from {}...", csv_path);
    let payments = load_income_csv(Path::new(csv_path))?;
    println!("✓ Loaded {} income rows from CSV", payments.len());

    let conn = open_database(config)?;
    let counts = insert_payments(&conn, &payments)?;
    let (_, total) = verify_counts(&conn)?;

    println!("💾 Inserted {} new rows", counts.inserted);
    println!("✓ Corrected: {}", counts.corrected);
    println!("✓ Duplicates skipped: {}", counts.duplicates);
    println!("✅ Database contains {} income rows", total);
    Ok(())
}

fn run_missing(config: &DuesConfig, donor_id: &str) -> Result<()> {
    let conn = open_database(config)?;
    let service = DuesService::from_config(SqliteRepository::new(&conn), SystemClock, config);

    let rec = match service.reconcile_donor(donor_id) {
        Err(DuesError::DonorNotFound(id)) => {
            eprintln!("❌ Donor not found: {}", id);
            std::process::exit(1);
        }
        other => other?,
    };

    println!("📅 {} - missing months as of {}", rec.donor_name, rec.as_of);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if rec.is_settled() {
        println!("✅ No missing months");
    } else {
        for month in &rec.missing {
            println!("  ✗ {}", month);
        }
        println!(
            "\n💰 {} month(s) × {} {:.2} = {} {:.2}",
            rec.missing_count(),
            config.currency,
            rec.monthly_amount,
            config.currency,
            rec.total_due
        );
    }
    for label in &rec.unrecognized_labels {
        println!("⚠️  Unrecognized month label on file: '{}'", label);
    }
    Ok(())
}

fn run_paid(config: &DuesConfig, donor_id: &str) -> Result<()> {
    let conn = open_database(config)?;
    let service = DuesService::from_config(SqliteRepository::new(&conn), SystemClock, config);

    let paid = match service.get_donor_paid_months(donor_id) {
        Err(DuesError::DonorNotFound(id)) => {
            eprintln!("❌ Donor not found: {}", id);
            std::process::exit(1);
        }
        other => other?,
    };

    println!("📅 Paid months for {}", donor_id);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if paid.is_empty() {
        println!("  (none)");
    }
    for month in &paid {
        println!("  ✓ {}", month);
    }
    Ok(())
}

fn run_report(config: &DuesConfig) -> Result<()> {
    let conn = open_database(config)?;
    let service = DuesService::from_config(SqliteRepository::new(&conn), SystemClock, config);
    let report = service.dues_report()?;

    println!("📊 Dues report - {} - {}", config.mosque_name, report.generated_on);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for row in report.outstanding() {
        println!(
            "  {:<24} {:>3} month(s)  {} {:>10.2}",
            row.donor_name, row.missing_count, config.currency, row.total_due
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "💰 {} of {} donors owe {} {:.2}",
        report.donors_with_dues,
        report.rows.len(),
        config.currency,
        report.total_outstanding
    );
    for skipped in &report.skipped {
        println!("⚠️  Not included: {} ({})", skipped.donor_id, skipped.reason);
    }
    Ok(())
}

fn run_audit(config: &DuesConfig, apply: bool) -> Result<()> {
    let conn = open_database(config)?;
    let service = DuesService::from_config(SqliteRepository::new(&conn), SystemClock, config);
    let entries = service.status_audit()?;
    let mismatches: Vec<_> = entries.iter().filter(|e| e.is_mismatch()).collect();

    println!("🚦 Status audit ({} donors)", entries.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if mismatches.is_empty() {
        println!("✅ Stored status matches payment history for every donor");
        return Ok(());
    }

    for entry in &mismatches {
        println!(
            "  {:<24} {} → {} ({} missing)",
            entry.donor_name,
            entry.stored.as_str(),
            entry.suggested.as_str(),
            entry.missing_count
        );
    }

    if apply {
        for entry in &mismatches {
            update_donor_status(&conn, &entry.donor_id, entry.suggested, "status-audit")?;
        }
        println!("\n✅ Applied {} status change(s)", mismatches.len());
    } else {
        println!("\nRun with --apply to update stored status");
    }
    Ok(())
}

fn run_notices(config: &DuesConfig) -> Result<()> {
    let conn = open_database(config)?;
    let service = DuesService::from_config(SqliteRepository::new(&conn), SystemClock, config);
    let notices = service.notices()?;

    for notice in &notices {
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("📨 To: {} {}", notice.donor_name, notice.phone);
        println!("{}", notice.message);
    }
    println!("✅ {} notice(s)", notices.len());
    Ok(())
}

fn run_quality(config: &DuesConfig) -> Result<()> {
    let conn = open_database(config)?;
    let donors = load_all_donors(&conn)?;
    let payments = get_all_payments(&conn)?;

    let engine = DataQualityEngine::with_max_span(config.max_span_months);
    let reports = engine.validate_all(&donors, &payments, SystemClock.today());
    let duplicates = engine.find_duplicate_payments(&payments);

    println!("🔍 Data quality");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for report in reports.iter().filter(|r| !r.is_clean()) {
        println!("{}", report.summary());
        for issue in &report.issues {
            println!("  {:?} [{}] {}", issue.severity, issue.field, issue.issue);
            println!("    → {}", issue.recommendation);
        }
    }
    for issue in &duplicates {
        println!("  {:?} {}", issue.severity, issue.issue);
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {}", engine.batch_summary(&reports).summary());
    Ok(())
}
