use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use expense_ledger::{
    categories, category_breakdown, export_csv, export_file_name, export_json, format_money,
    import_json, query, seed_demo, wipe, AppConfig, Clock, ExpenseFilter, ExpensePatch,
    ExpenseStore, JsonFileStore, NewExpense, RecurringEngine, Settings, SortDir, SortKey,
    SortOrder, SqliteStore, Summary, SystemClock, YearMonth, DEFAULT_PAGE_SIZE,
};

/// Expense Ledger - Track expenses and keep recurring ones up to date
#[derive(Parser)]
#[command(name = "expense-ledger")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite database path (defaults to EXPENSES_DB or the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Use a local JSON file instead of SQLite
    #[arg(long, global = true, conflicts_with = "db")]
    local: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an expense
    Add {
        title: String,
        amount: f64,
        #[arg(short, long)]
        category: Option<String>,
        /// YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<String>,
        /// Repeat every month
        #[arg(short, long)]
        recurring: bool,
        /// Explicit recurring group key (defaults to title|amount|category)
        #[arg(long, requires = "recurring")]
        key: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },

    /// Filtered, sorted, paginated table
    List {
        /// YYYY-MM
        #[arg(short, long)]
        month: Option<YearMonth>,
        #[arg(short, long)]
        category: Option<String>,
        /// Title contains (case-insensitive)
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value = "date")]
        sort: SortKey,
        /// asc or desc (defaults per sort key)
        #[arg(long)]
        dir: Option<SortDir>,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Change fields of an expense
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        /// Remove the category
        #[arg(long, conflicts_with = "category")]
        clear_category: bool,
        #[arg(long)]
        date: Option<String>,
    },

    /// Remove an expense
    Delete { id: String },

    /// Totals and per-category breakdown
    Summary {
        /// Restrict the breakdown to one month (YYYY-MM)
        #[arg(short, long)]
        month: Option<YearMonth>,
    },

    /// Known categories
    Categories,

    /// Backfill missing months of recurring expenses
    Reconcile,

    /// Write all expenses to a file
    Export {
        /// Output path (defaults to expenses-YYYY-MM-DD.json)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long)]
        csv: bool,
    },

    /// Load expenses from an exported JSON file
    Import { file: PathBuf },

    /// Delete ALL expenses
    Wipe {
        #[arg(long)]
        yes: bool,
    },

    /// Add demo data to an empty store
    Seed,

    /// Show or change display settings
    Settings {
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        locale: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = AppConfig::from_env();
    let clock = SystemClock;
    let mut store = open_store(&cli, &config)?;
    let settings = Settings::load(&config.settings_path).context("Failed to load settings")?;

    match cli.command {
        Commands::Add {
            title,
            amount,
            category,
            date,
            recurring,
            key,
            user,
        } => {
            let mut new = NewExpense::new(&title, amount, &date.unwrap_or_else(|| clock.today_iso()));
            new.category = category;
            new.user_id = user;
            if recurring {
                new = new.recurring(key.as_deref());
            }
            let expense = store.create(new)?;
            println!(
                "✓ Added {} {} on {} ({})",
                expense.title,
                format_money(expense.amount, &settings),
                expense.date,
                expense.id
            );
        }

        Commands::List {
            month,
            category,
            search,
            user,
            sort,
            dir,
            page,
            page_size,
        } => {
            run_reconcile(store.as_mut(), &clock)?;
            let all = store.list()?;
            let filter = ExpenseFilter {
                month,
                category,
                search,
                user_id: user,
            };
            let order = SortOrder {
                key: sort,
                dir: dir.unwrap_or_else(|| sort.default_dir()),
            };
            let paged = query(&all, &filter, order, page, page_size);

            println!("{:<10}  {:<28}  {:<20}  {:>12}  {}", "DATE", "TITLE", "CATEGORY", "AMOUNT", "ID");
            for e in &paged.rows {
                let mut category = e.category_or_empty().to_string();
                if category.is_empty() {
                    category = "—".to_string();
                }
                if e.recurring {
                    category.push_str(" • Recurring");
                }
                println!(
                    "{:<10}  {:<28}  {:<20}  {:>12}  {}",
                    e.date,
                    e.title,
                    category,
                    format_money(e.amount, &settings),
                    e.id
                );
            }

            let summary = Summary::compute(&all, paged.rows.iter().copied(), clock.current_month());
            println!(
                "\nPage {} / {}  ({} matching)  Page total: {}",
                paged.page,
                paged.total_pages,
                paged.total,
                format_money(summary.page_total, &settings)
            );
        }

        Commands::Edit {
            id,
            title,
            amount,
            category,
            clear_category,
            date,
        } => {
            let category = if clear_category {
                Some(None)
            } else {
                category.map(Some)
            };
            let patch = ExpensePatch {
                title,
                amount,
                category,
                date,
                user_id: None,
            };
            if patch.is_empty() {
                bail!("Nothing to change: pass at least one of --title, --amount, --category, --clear-category, --date");
            }
            let updated = store.update(&id, &patch)?;
            println!("✓ Updated {} ({})", updated.title, updated.id);
        }

        Commands::Delete { id } => {
            store.delete(&id)?;
            println!("✓ Deleted {}", id);
        }

        Commands::Summary { month } => {
            run_reconcile(store.as_mut(), &clock)?;
            let all = store.list()?;
            let summary = Summary::compute(&all, all.iter(), clock.current_month());

            println!("📊 Expense Summary");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("This month ({}): {}", summary.current_month, format_money(summary.month_total, &settings));
            println!("All time:          {}", format_money(summary.all_total, &settings));
            println!("Entries:           {}", summary.count);

            let filter = ExpenseFilter {
                month,
                ..Default::default()
            };
            let rows = filter.apply(&all);
            println!("\nBy category{}:", month.map(|m| format!(" ({})", m)).unwrap_or_default());
            for slice in category_breakdown(rows) {
                println!(
                    "  {:<20} {:>14}  {:>5.1}%",
                    slice.category,
                    format_money(slice.total, &settings),
                    slice.share
                );
            }
        }

        Commands::Categories => {
            for category in categories(&store.list()?) {
                println!("{}", category);
            }
        }

        Commands::Reconcile => {
            let report = run_reconcile(store.as_mut(), &clock)?;
            for e in &report.created {
                println!("  + {} {} ({})", e.date, e.title, format_money(e.amount, &settings));
            }
            for f in &report.failures {
                eprintln!("  ❌ {} {}: {}", f.month, f.group_key, f.error);
            }
            println!("✓ {}", report.summary());
        }

        Commands::Export { out, csv } => {
            let path = out.unwrap_or_else(|| {
                let name = export_file_name(&clock);
                if csv {
                    PathBuf::from(name.replace(".json", ".csv"))
                } else {
                    PathBuf::from(name)
                }
            });
            let count = if csv {
                let file = fs::File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                export_csv(store.as_ref(), file)?
            } else {
                let json = export_json(store.as_ref())?;
                fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                store.list()?.len()
            };
            println!("✓ Exported {} expenses to {}", count, path.display());
        }

        Commands::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let count = import_json(store.as_mut(), &raw).context("Import failed")?;
            let report = run_reconcile(store.as_mut(), &clock)?;
            println!("✓ Imported {} expenses ({} recurring backfilled)", count, report.created_count());
        }

        Commands::Wipe { yes } => {
            if !yes {
                bail!("This deletes ALL expenses. Re-run with --yes to confirm.");
            }
            let count = wipe(store.as_mut())?;
            println!("✓ Deleted {} expenses", count);
        }

        Commands::Seed => {
            let count = seed_demo(store.as_mut(), &clock)?;
            if count == 0 {
                println!("Store already has data; nothing seeded");
            } else {
                println!("✓ Seeded {} demo expenses", count);
            }
        }

        Commands::Settings { currency, locale } => {
            let mut settings = settings;
            if currency.is_none() && locale.is_none() {
                println!("currency = {}", settings.currency);
                println!("locale   = {}", settings.locale);
                return Ok(());
            }
            if let Some(currency) = currency {
                settings.set_currency(&currency)?;
            }
            if let Some(locale) = locale {
                settings.set_locale(&locale)?;
            }
            settings.save(&config.settings_path)?;
            println!("✓ Settings saved: {} / {}", settings.currency, settings.locale);
        }
    }

    Ok(())
}

fn open_store(cli: &Cli, config: &AppConfig) -> Result<Box<dyn ExpenseStore>> {
    if let Some(path) = &cli.local {
        let store = JsonFileStore::open(path)
            .with_context(|| format!("Failed to open local store {}", path.display()))?;
        return Ok(Box::new(store));
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    ensure_parent(&db_path)?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?
        .with_actor("cli");
    Ok(Box::new(store))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

fn run_reconcile(
    store: &mut dyn ExpenseStore,
    clock: &SystemClock,
) -> Result<expense_ledger::ReconcileReport> {
    let engine = RecurringEngine::new(*clock);
    let report = engine.reconcile_store(store)?;
    Ok(report)
}
