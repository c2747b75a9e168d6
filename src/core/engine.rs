use super::types::{
    AcceleratorPolicy, BaselineReference, LoanParameters, ScheduleRow, SimulationResult,
};

/// A balance at or below this is treated as fully repaid. Kept at 1e-8 so
/// near-zero balances resolve identically across reruns.
const PAYOFF_EPSILON: f64 = 1e-8;

/// Level monthly payment that amortizes `principal` over `remaining_months`
/// at the given nominal annual rate. Returns 0 for a zero-month horizon and
/// falls back to straight division when the monthly rate is exactly zero.
pub fn level_payment(principal: f64, annual_rate_percent: f64, remaining_months: u32) -> f64 {
    if remaining_months == 0 {
        return 0.0;
    }
    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    if monthly_rate == 0.0 {
        return principal / remaining_months as f64;
    }
    principal * monthly_rate / (1.0 - (1.0 + monthly_rate).powi(-(remaining_months as i32)))
}

#[derive(Debug)]
struct Ledger {
    balance: f64,
    total_paid: f64,
    total_interest: f64,
    elapsed_months: u32,
    payoff_month: Option<u32>,
}

impl Ledger {
    fn new(principal: f64) -> Self {
        Self {
            balance: principal,
            total_paid: 0.0,
            total_interest: 0.0,
            elapsed_months: 0,
            payoff_month: None,
        }
    }

    fn paid_off(&self) -> bool {
        self.balance <= PAYOFF_EPSILON
    }

    /// Runs up to twelve months at a fixed payment, stopping at payoff.
    /// The principal portion is clamped to `[0, balance]`, so a payment
    /// below the interest-only amount leaves the balance untouched and a
    /// payment past the remaining balance is capped at payoff.
    fn run_year(&mut self, payment: f64, monthly_rate: f64) {
        for _ in 0..12 {
            if self.paid_off() {
                break;
            }
            let interest = self.balance * monthly_rate;
            let principal_portion = (payment - interest).clamp(0.0, self.balance);
            self.balance -= principal_portion;
            self.total_interest += interest;
            self.total_paid += principal_portion + interest;
            self.elapsed_months += 1;
            if self.paid_off() && self.payoff_month.is_none() {
                self.payoff_month = Some(self.elapsed_months);
                break;
            }
        }
    }
}

fn fill_trailing_rows(rows: &mut Vec<ScheduleRow>, term_years: u32) {
    for year in rows.len() as u32 + 1..=term_years {
        rows.push(ScheduleRow {
            year,
            monthly_payment: None,
            payment_increase: None,
            end_of_year_balance: 0.0,
        });
    }
}

/// Amortization schedule with no accelerator applied. The embedded
/// `baseline` block reports this same run's totals.
pub fn simulate_baseline(params: &LoanParameters) -> SimulationResult {
    simulate(params, &AcceleratorPolicy::None)
}

/// Amortization schedule under an accelerator policy. The `baseline` block
/// is always the non-accelerated run over the same loan, for comparison.
pub fn simulate(params: &LoanParameters, policy: &AcceleratorPolicy) -> SimulationResult {
    let total_months = params.term_years * 12;
    let monthly_rate = params.annual_rate_percent / 100.0 / 12.0;
    let baseline_payment = level_payment(params.principal, params.annual_rate_percent, total_months);
    let baseline = baseline_reference(params, baseline_payment, monthly_rate, total_months);

    let activation_year = policy
        .activation_year()
        .unwrap_or(1)
        .clamp(1, params.term_years.max(1));

    let mut ledger = Ledger::new(params.principal);
    let mut rows = Vec::with_capacity(params.term_years as usize);
    let mut last_payment = baseline_payment;
    let mut activated_years = 0_u32;

    for year in 1..=params.term_years {
        let payment = if year < activation_year {
            baseline_payment
        } else {
            match *policy {
                AcceleratorPolicy::None => baseline_payment,
                AcceleratorPolicy::FlatStep { step_amount, .. } => last_payment + step_amount,
                AcceleratorPolicy::PercentStep { fraction, .. } => last_payment * (1.0 + fraction),
                AcceleratorPolicy::TermShorten { months_per_year, .. } => {
                    activated_years += 1;
                    let remaining_baseline_months = total_months - (year - 1) * 12;
                    let target_months = remaining_baseline_months
                        .saturating_sub(activated_years * months_per_year)
                        .max(1);
                    level_payment(ledger.balance, params.annual_rate_percent, target_months)
                }
            }
        };

        let increase = if year == 1 { 0.0 } else { payment - last_payment };
        ledger.run_year(payment, monthly_rate);
        rows.push(ScheduleRow {
            year,
            monthly_payment: Some(payment),
            payment_increase: Some(increase),
            end_of_year_balance: ledger.balance.max(0.0),
        });
        last_payment = payment;

        if ledger.paid_off() {
            break;
        }
    }
    fill_trailing_rows(&mut rows, params.term_years);

    SimulationResult {
        rows,
        total_paid: ledger.total_paid,
        total_interest: ledger.total_interest,
        payoff_month: ledger.payoff_month,
        baseline,
    }
}

fn baseline_reference(
    params: &LoanParameters,
    payment: f64,
    monthly_rate: f64,
    total_months: u32,
) -> BaselineReference {
    let mut ledger = Ledger::new(params.principal);
    for _ in 0..params.term_years {
        ledger.run_year(payment, monthly_rate);
        if ledger.paid_off() {
            break;
        }
    }

    BaselineReference {
        monthly_payment: payment,
        total_paid: ledger.total_paid,
        total_interest: ledger.total_interest,
        total_months,
        payoff_month: ledger.payoff_month,
    }
}
