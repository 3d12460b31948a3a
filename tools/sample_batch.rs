//! Sample Batch Generator
//!
//! Writes a CSV of random applicants in the scoring service's input schema
//! to stdout, for trying out batch mode.

use clap::Parser;
use rand::Rng;
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sample-batch", about = "Generate a random applicant CSV")]
struct Args {
    /// Number of applicants
    #[arg(default_value_t = 100)]
    rows: usize,

    /// Share of applicants drawn from the risky profile
    #[arg(default_value_t = 0.1)]
    risky_rate: f64,
}

/// One applicant row, columns in wire order
#[derive(Debug, Serialize)]
struct Applicant {
    device_os: &'static str,
    source: &'static str,
    housing_status: &'static str,
    employment_status: &'static str,
    payment_type: &'static str,
    date_of_birth_distinct_emails_4w: i64,
    name_email_similarity: f64,
    credit_risk_score: i64,
    customer_age: i64,
    month: i64,
    has_other_cards: i64,
    proposed_credit_limit: i64,
    prev_address_months_count: i64,
    zip_count_4w: i64,
    income: f64,
    device_distinct_emails_8w: i64,
    bank_months_count: i64,
    phone_home_valid: bool,
    foreign_request: bool,
    keep_alive_session: bool,
    email_is_free: bool,
}

struct ApplicantGenerator {
    rng: rand::rngs::ThreadRng,
}

impl ApplicantGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    fn generate_regular(&mut self) -> Applicant {
        Applicant {
            device_os: self.random_choice(&["windows", "other", "linux", "macintosh", "x11"]),
            source: self.random_choice(&["INTERNET", "INTERNET", "INTERNET", "TELEAPP"]),
            housing_status: self.random_choice(&["BA", "BB", "BC", "BD", "BE", "BF", "BG"]),
            employment_status: self.random_choice(&["CA", "CB", "CC", "CD", "CE", "CF", "CG"]),
            payment_type: self.random_choice(&["AA", "AB", "AC", "AD", "AE"]),
            date_of_birth_distinct_emails_4w: self.rng.gen_range(0..10),
            name_email_similarity: round4(self.rng.gen_range(0.3..1.0)),
            credit_risk_score: self.rng.gen_range(50..300),
            customer_age: self.rng.gen_range(2..7) * 10,
            month: self.rng.gen_range(0..=7),
            has_other_cards: self.rng.gen_range(0..=1),
            proposed_credit_limit: [200, 500, 1000, 1500][self.rng.gen_range(0..4)],
            prev_address_months_count: self.rng.gen_range(0..200),
            zip_count_4w: self.rng.gen_range(1..3000),
            income: (self.rng.gen_range(1..=9) as f64) / 10.0,
            device_distinct_emails_8w: self.rng.gen_range(0..=1),
            bank_months_count: self.rng.gen_range(0..32),
            phone_home_valid: self.rng.gen_bool(0.6),
            foreign_request: self.rng.gen_bool(0.02),
            keep_alive_session: self.rng.gen_bool(0.8),
            email_is_free: self.rng.gen_bool(0.5),
        }
    }

    /// Profile with the attributes the scoring model tends to flag
    fn generate_risky(&mut self) -> Applicant {
        let mut applicant = self.generate_regular();
        applicant.name_email_similarity = round4(self.rng.gen_range(0.0..0.3));
        applicant.credit_risk_score = self.rng.gen_range(200..400);
        applicant.income = (self.rng.gen_range(6..=9) as f64) / 10.0;
        applicant.device_distinct_emails_8w = self.rng.gen_range(1..=3);
        applicant.phone_home_valid = false;
        applicant.foreign_request = self.rng.gen_bool(0.5);
        applicant.keep_alive_session = false;
        applicant.email_is_free = true;
        applicant
    }

    fn random_choice(&mut self, choices: &[&'static str]) -> &'static str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_batch=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.risky_rate) {
        anyhow::bail!("risky_rate must be within [0, 1], got {}", args.risky_rate);
    }

    let mut generator = ApplicantGenerator::new();
    let mut rng = rand::thread_rng();
    let mut writer = csv::Writer::from_writer(std::io::stdout());

    let mut risky_count = 0;
    for _ in 0..args.rows {
        let applicant = if rng.gen_bool(args.risky_rate) {
            risky_count += 1;
            generator.generate_risky()
        } else {
            generator.generate_regular()
        };
        writer.serialize(&applicant)?;
    }
    writer.flush()?;

    info!(
        rows = args.rows,
        risky = risky_count,
        "Sample batch written"
    );
    Ok(())
}
