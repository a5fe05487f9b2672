use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use tracing::debug;

use seprov::api::{
    BackendFamily, CertSlot, ConfigurationTable, DistinguishedName, Ecp256Certificate, KeySlot,
    ProvisioningConfig, ValidityPeriod,
};
use seprov::ports::SecureElementBackend;
use seprov::{Eccx08, Se05x, SecureElement};

#[derive(Parser, Debug)]
#[command(name = "seprov")]
#[command(about = "Secure element certificate provisioning", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Secure element family to drive
    #[arg(long, global = true, default_value = "eccx08")]
    pub family: FamilyArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the device serial number and lock state
    Info,

    /// Draw a number from the device RNG in [min, max)
    Random {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        min: i64,

        #[arg(long, allow_negative_numbers = true)]
        max: i64,
    },

    /// Generate a key and print a PEM certificate signing request
    Csr {
        /// Key slot holding the signing key
        #[arg(long, default_value_t = 0)]
        key_slot: u16,

        /// Sign with the key already in the slot instead of minting one
        #[arg(long)]
        reuse_key: bool,

        #[command(flatten)]
        subject: SubjectArgs,
    },

    /// Configure the device, issue a device certificate and store it
    Provision {
        /// Key slot holding the signing key
        #[arg(long, default_value_t = 0)]
        key_slot: u16,

        /// Slot receiving the certificate
        #[arg(long, default_value_t = 8)]
        cert_slot: u16,

        /// Lock the device configuration after writing it
        #[arg(long)]
        lock: bool,

        /// Certificate serial number in hex. Drawn from the device RNG if not provided
        #[arg(long)]
        serial: Option<String>,

        /// Configuration table in hex. Uses the family default if not provided
        #[arg(long)]
        config: Option<String>,

        /// Common name of the issuer. Self-issued if not provided
        #[arg(long)]
        issuer_common_name: Option<String>,

        #[arg(long, default_value_t = 2024)]
        issue_year: u16,

        #[arg(long, default_value_t = 31)]
        expire_years: u8,

        #[command(flatten)]
        subject: SubjectArgs,
    },
}

#[derive(Args, Debug)]
pub struct SubjectArgs {
    /// Subject common name. Defaults to the device serial number
    #[arg(long)]
    pub common_name: Option<String>,

    #[arg(long)]
    pub organization: Option<String>,

    #[arg(long)]
    pub organizational_unit: Option<String>,

    /// Two-letter country code
    #[arg(long)]
    pub country: Option<String>,
}

impl SubjectArgs {
    fn to_name(&self, serial_number: &str) -> DistinguishedName {
        DistinguishedName {
            country: self.country.clone(),
            organization: self.organization.clone(),
            organizational_unit: self.organizational_unit.clone(),
            common_name: self
                .common_name
                .clone()
                .unwrap_or_else(|| serial_number.to_string()),
            ..DistinguishedName::default()
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FamilyArg {
    Eccx08,
    Se05x,
}

impl From<FamilyArg> for BackendFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Eccx08 => BackendFamily::Eccx08,
            FamilyArg::Se05x => BackendFamily::Se05x,
        }
    }
}

fn run<B: SecureElementBackend>(
    mut se: SecureElement<B>,
    family: BackendFamily,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Info => {
            se.begin().context("failed to open secure element session")?;
            println!("family: {}", family);
            println!("serial: {}", se.serial_number()?);
            println!("locked: {}", se.locked()?);
            se.end()?;
        }

        Commands::Random { min, max } => {
            se.begin().context("failed to open secure element session")?;
            println!("{}", se.random_range(min, max)?);
            se.end()?;
        }

        Commands::Csr {
            key_slot,
            reuse_key,
            subject,
        } => {
            se.begin().context("failed to open secure element session")?;
            let serial_number = se.serial_number()?;
            let mut csr = Ecp256Certificate::new(subject.to_name(&serial_number));
            let key = se
                .build_csr(&mut csr, KeySlot::new(key_slot), !reuse_key)
                .context("failed to build CSR")?;
            debug!("Public key: {}", hex::encode(key.public_key().as_bytes()));
            print!("{}", csr.to_pem()?);
            se.end()?;
        }

        Commands::Provision {
            key_slot,
            cert_slot,
            lock,
            serial,
            config,
            issuer_common_name,
            issue_year,
            expire_years,
            subject,
        } => {
            let serial = serial
                .map(|s| hex::decode(s).map_err(|e| anyhow::anyhow!("Invalid serial hex: {}", e)))
                .transpose()?;
            let configuration = config
                .map(|c| ConfigurationTable::from_hex(&c))
                .transpose()
                .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

            // Subject falls back to the serial number, which needs a session
            se.begin().context("failed to open secure element session")?;
            let serial_number = se.serial_number()?;

            let config = ProvisioningConfig {
                family,
                key_slot: KeySlot::new(key_slot),
                cert_slot: CertSlot::new(cert_slot),
                mint_new_key: true,
                subject: Some(subject.to_name(&serial_number)),
                issuer: issuer_common_name.map(DistinguishedName::with_common_name),
                serial,
                validity: ValidityPeriod {
                    issue_year,
                    expire_years,
                    ..ValidityPeriod::default()
                },
                configuration,
                lock_device: lock,
            };

            let report = seprov::provision_device(&mut se, &config)
                .context("failed to provision device")?;
            println!("serial: {}", report.serial_number);
            println!("public key: {}", hex::encode(report.public_key.as_bytes()));
            println!("locked: {}", report.locked);
            print!("{}", report.csr_pem);
            print!("{}", report.certificate_pem);
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let family = BackendFamily::from(cli.family);
    match family {
        BackendFamily::Eccx08 => run(SecureElement::new(Eccx08::new()), family, cli.command),
        BackendFamily::Se05x => run(SecureElement::new(Se05x::new()), family, cli.command),
    }
}
