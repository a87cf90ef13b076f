//! `fbbridge`: developer CLI for probing a Firebird client library and
//! running quick checks against a server.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use eyre::{bail, eyre, Context as _, Result};
use fbbridge_core::coder::{DatatypeCoder, EncodingFactory};
use fbbridge_core::consts::{
    ISC_INFO_END, ISC_INFO_SVC_IMPLEMENTATION, ISC_INFO_SVC_SERVER_VERSION, SQL_INT64, SQL_LONG,
    SQL_SHORT,
};
use fbbridge_core::fields::FieldDescriptor;
use fbbridge_core::{
    ConnectionProperties, DatabaseFactory, Encoding, ExecuteResult, FactoryKind,
    ParameterBuffer, ServiceProperties, WireCrypt,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fbbridge", version, about)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the client library and list its optional entry points.
    Probe,
    /// Attach, ping and print database properties.
    Ping,
    /// Run one statement and print its rows.
    Query {
        /// Statement text.
        sql: String,
        /// Stop after this many rows.
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Print every column as hex.
        #[arg(long)]
        hex: bool,
        /// Commit instead of rolling back when done.
        #[arg(long)]
        commit: bool,
    },
    /// Attach to the service manager and print the server version.
    Service,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Client,
    Embedded,
    Local,
}

impl From<Kind> for FactoryKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Client => Self::Client,
            Kind::Embedded => Self::Embedded,
            Kind::Local => Self::Local,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Crypt {
    Default,
    Required,
    Enabled,
    Disabled,
}

impl From<Crypt> for WireCrypt {
    fn from(crypt: Crypt) -> Self {
        match crypt {
            Crypt::Default => Self::Default,
            Crypt::Required => Self::Required,
            Crypt::Enabled => Self::Enabled,
            Crypt::Disabled => Self::Disabled,
        }
    }
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// Which client library and attach string style to use.
    #[arg(long, value_enum, default_value = "client", env = "FBBRIDGE_KIND", global = true)]
    kind: Kind,

    /// Server host. Omit for local access.
    #[arg(long, env = "FIREBIRD_HOST", global = true)]
    host: Option<String>,

    #[arg(long, env = "FIREBIRD_PORT", default_value_t = 3050, global = true)]
    port: u16,

    /// Database path or alias.
    #[arg(long, short = 'd', env = "FIREBIRD_DATABASE", global = true)]
    database: Option<String>,

    #[arg(long, short = 'u', env = "ISC_USER", global = true)]
    user: Option<String>,

    #[arg(long, short = 'p', env = "ISC_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[arg(long, global = true)]
    role: Option<String>,

    /// Connection character set.
    #[arg(long, default_value = "UTF8", value_parser = parse_encoding, global = true)]
    charset: Encoding,

    #[arg(long, value_enum, default_value = "default", global = true)]
    wire_crypt: Crypt,

    /// Directory searched for the client library before the default names.
    #[arg(long, env = "FBBRIDGE_LIBRARY_PATH", global = true)]
    library_path: Option<PathBuf>,
}

fn parse_encoding(name: &str) -> Result<Encoding, String> {
    Encoding::from_charset(name).map_err(|err| err.to_string())
}

impl ConnectionArgs {
    fn database_properties(&self) -> Result<ConnectionProperties> {
        let database = self
            .database
            .clone()
            .ok_or_else(|| eyre!("no database given; use --database or FIREBIRD_DATABASE"))?;
        Ok(ConnectionProperties {
            server_name: self.host.clone(),
            port_number: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            role_name: self.role.clone(),
            encoding: self.charset,
            native_library_path: self.library_path.clone(),
            wire_crypt: self.wire_crypt.into(),
            process_name: Some(env!("CARGO_PKG_NAME").to_string()),
            process_id: Some(std::process::id()),
            ..ConnectionProperties::new(database)
        })
    }

    fn service_properties(&self) -> ServiceProperties {
        ServiceProperties {
            server_name: self.host.clone(),
            port_number: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            role_name: self.role.clone(),
            encoding: self.charset,
            native_library_path: self.library_path.clone(),
            wire_crypt: self.wire_crypt.into(),
            ..ServiceProperties::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let factory = DatabaseFactory::shared(cli.connection.kind.into());

    match cli.command {
        Command::Probe => probe(factory, &cli.connection),
        Command::Ping => ping(factory, &cli.connection),
        Command::Query {
            sql,
            limit,
            hex,
            commit,
        } => query(factory, &cli.connection, &sql, limit, hex, commit),
        Command::Service => service(factory, &cli.connection),
    }
}

fn probe(factory: &DatabaseFactory, args: &ConnectionArgs) -> Result<()> {
    factory
        .library(args.library_path.as_deref())
        .wrap_err("loading the client library")?;
    let features = factory.features().unwrap_or_default();
    println!("kind: {}", factory.kind());
    for feature in fbbridge_core::ClientFeature::all() {
        let mark = if features.contains(feature) { "yes" } else { "no" };
        println!("{:<28} {:<3} ({})", feature.to_string(), mark, feature.entry_point());
    }
    Ok(())
}

fn ping(factory: &DatabaseFactory, args: &ConnectionArgs) -> Result<()> {
    let db = factory.connect(args.database_properties()?)?;
    tracing::info!(attach = db.attach_name(), "attaching");
    db.attach().wrap_err_with(|| format!("attaching {}", db.attach_name()))?;
    db.ping()?;
    let info = db.info()?;
    println!("attached: {}", db.attach_name());
    println!("dialect:  {}", info.dialect);
    println!("ods:      {}.{}", info.ods_major, info.ods_minor);
    db.detach()?;
    Ok(())
}

fn query(
    factory: &DatabaseFactory,
    args: &ConnectionArgs,
    sql: &str,
    limit: usize,
    hex: bool,
    commit: bool,
) -> Result<()> {
    let db = factory.connect(args.database_properties()?)?;
    db.attach().wrap_err_with(|| format!("attaching {}", db.attach_name()))?;
    let tr = db.start_transaction(&ParameterBuffer::read_committed())?;
    let mut stmt = db.create_statement(Some(&tr))?;
    stmt.prepare(sql).wrap_err("preparing statement")?;
    if !stmt.parameters().is_empty() {
        bail!(
            "statement has {} parameters; the CLI only runs statements without parameters",
            stmt.parameters().count()
        );
    }
    tracing::debug!(statement_type = ?stmt.statement_type(), "prepared");

    let coder = EncodingFactory::new(db.encoding()).native_coder();
    let fields = stmt.fields().fields().to_vec();
    if !fields.is_empty() {
        let names: Vec<&str> = fields.iter().map(column_name).collect();
        println!("{}", names.join("\t"));
    }

    let mut printed = 0;
    match stmt.execute(&[])? {
        ExecuteResult::NoResult => println!("ok"),
        ExecuteResult::Singleton => {
            if let Some(row) = stmt.take_row() {
                print_row(&fields, &row, db.encoding(), coder.as_ref(), hex)?;
            }
        }
        ExecuteResult::Cursor => {
            while printed < limit {
                if stmt.buffered_rows() == 0 {
                    if stmt.all_rows_fetched() {
                        break;
                    }
                    if stmt.fetch_rows(limit - printed)? == 0 {
                        break;
                    }
                    continue;
                }
                if let Some(row) = stmt.take_row() {
                    print_row(&fields, &row, db.encoding(), coder.as_ref(), hex)?;
                    printed += 1;
                }
            }
            stmt.close_cursor()?;
        }
    }
    stmt.close()?;

    if commit {
        tr.commit()?;
    } else {
        tr.rollback()?;
    }
    db.detach()?;
    tracing::info!(rows = printed, "done");
    Ok(())
}

fn service(factory: &DatabaseFactory, args: &ConnectionArgs) -> Result<()> {
    let service = factory.connect_service(args.service_properties())?;
    service
        .attach()
        .wrap_err_with(|| format!("attaching {}", service.attach_name()))?;
    let response = service.query(
        &[],
        &[ISC_INFO_SVC_SERVER_VERSION, ISC_INFO_SVC_IMPLEMENTATION, ISC_INFO_END],
        1024,
    )?;
    let info = fbbridge_core::info::parse(&response)?;
    for (tag, label) in [
        (ISC_INFO_SVC_SERVER_VERSION, "server version"),
        (ISC_INFO_SVC_IMPLEMENTATION, "implementation"),
    ] {
        if let Some(item) = info.get(tag) {
            println!("{label}: {}", args.charset.decode(&item.value));
        }
    }
    service.detach()?;
    Ok(())
}

fn column_name(field: &FieldDescriptor) -> &str {
    if field.alias.is_empty() {
        &field.field_name
    } else {
        &field.alias
    }
}

fn print_row(
    fields: &[FieldDescriptor],
    row: &[Option<Vec<u8>>],
    encoding: Encoding,
    coder: &dyn DatatypeCoder,
    hex: bool,
) -> Result<()> {
    let columns = fields
        .iter()
        .zip(row)
        .map(|(field, value)| match value {
            None => Ok("<null>".to_string()),
            Some(bytes) if hex => Ok(to_hex(bytes)),
            Some(bytes) => render(field, bytes, encoding, coder),
        })
        .collect::<Result<Vec<_>>>()?;
    println!("{}", columns.join("\t"));
    Ok(())
}

fn render(
    field: &FieldDescriptor,
    bytes: &[u8],
    encoding: Encoding,
    coder: &dyn DatatypeCoder,
) -> Result<String> {
    if field.is_varying() || field.is_fixed_text() {
        return Ok(encoding.decode(bytes));
    }
    let integer = match field.sql_type {
        SQL_SHORT => i64::from(coder.decode_short(bytes, 0)?),
        SQL_LONG => i64::from(coder.decode_int(bytes, 0)?),
        SQL_INT64 => coder.decode_long(bytes, 0)?,
        _ => return Ok(to_hex(bytes)),
    };
    Ok(scaled(integer, field.scale))
}

/// Formats an exact numeric with a non-positive scale.
fn scaled(value: i64, scale: i32) -> String {
    let digits = scale
        .checked_neg()
        .and_then(|digits| usize::try_from(digits).ok())
        .unwrap_or(0);
    if digits == 0 {
        return value.to_string();
    }
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = format!("{:0>width$}", value.unsigned_abs(), width = digits + 1);
    let (whole, fraction) = magnitude.split_at(magnitude.len() - digits);
    format!("{sign}{whole}.{fraction}")
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
