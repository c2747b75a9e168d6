use serde::Serialize;

/// Fixed-rate loan inputs. Upstream is responsible for range validation
/// (principal > 0, rate >= 0, 5..=40 year term); the engine stays total.
#[derive(Debug, Clone, Copy)]
pub struct LoanParameters {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub term_years: u32,
}

/// Voluntary-overpayment strategy. Years strictly before `activation_year`
/// keep the unmodified baseline payment; the recurrence starts at
/// `activation_year` (1-based, clamped into `1..=term_years`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceleratorPolicy {
    None,
    /// Each activation year adds a fixed amount to the previous year's payment.
    FlatStep {
        step_amount: f64,
        activation_year: u32,
    },
    /// Each activation year multiplies the previous year's payment by
    /// `1 + fraction`.
    PercentStep {
        fraction: f64,
        activation_year: u32,
    },
    /// Each activation year shortens the remaining target term by
    /// `months_per_year` per activated year and re-amortizes the current
    /// balance over the shrunk horizon.
    TermShorten {
        months_per_year: u32,
        activation_year: u32,
    },
}

impl AcceleratorPolicy {
    pub fn activation_year(&self) -> Option<u32> {
        match *self {
            AcceleratorPolicy::None => None,
            AcceleratorPolicy::FlatStep {
                activation_year, ..
            }
            | AcceleratorPolicy::PercentStep {
                activation_year, ..
            }
            | AcceleratorPolicy::TermShorten {
                activation_year, ..
            } => Some(activation_year),
        }
    }
}

/// One loan-year of the schedule. Trailing rows after payoff carry `None`
/// payment/increase and a zero balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub year: u32,
    pub monthly_payment: Option<f64>,
    pub payment_increase: Option<f64>,
    pub end_of_year_balance: f64,
}

/// Totals of the non-accelerated schedule, always carried for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineReference {
    pub monthly_payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
    pub total_months: u32,
    pub payoff_month: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub rows: Vec<ScheduleRow>,
    pub total_paid: f64,
    pub total_interest: f64,
    pub payoff_month: Option<u32>,
    pub baseline: BaselineReference,
}
