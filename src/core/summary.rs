//! Summary business logic - dashboard and yearly views over a user's cards.
//!
//! Every view is a pure function of a [`Snapshot`] plus a date or year. The
//! snapshot is indexed once into maps keyed by `(user_card_id, benefit_id)` so
//! each view is a single pass over the user's (card, benefit) pairs. The
//! `load_*` functions fetch the snapshot and apply the matching view.

use crate::{
    core::{
        clock::Clock,
        period::{self, PeriodKey},
        preference,
        snapshot::{Snapshot, load_user_snapshot},
    },
    errors::{Error, Result},
    models::{Benefit, Card, Preference, Redemption, UserCard},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use std::collections::HashMap;
use tracing::instrument;

type PairKey = (i64, i64);

/// Lookup tables built once per snapshot.
struct SnapshotIndex<'a> {
    cards: HashMap<i64, &'a Card>,
    benefits_by_card: HashMap<i64, Vec<&'a Benefit>>,
    redemptions: HashMap<PairKey, Vec<&'a Redemption>>,
    preferences: HashMap<PairKey, &'a Preference>,
}

impl<'a> SnapshotIndex<'a> {
    fn build(snapshot: &'a Snapshot) -> Self {
        let cards = snapshot.cards.iter().map(|c| (c.id, c)).collect();

        let mut benefits_by_card: HashMap<i64, Vec<&'a Benefit>> = HashMap::new();
        for benefit in &snapshot.benefits {
            benefits_by_card.entry(benefit.card_id).or_default().push(benefit);
        }

        let mut redemptions: HashMap<PairKey, Vec<&'a Redemption>> = HashMap::new();
        for row in &snapshot.redemptions {
            redemptions
                .entry((row.user_card_id, row.benefit_id))
                .or_default()
                .push(row);
        }

        let preferences = snapshot
            .preferences
            .iter()
            .map(|p| ((p.user_card_id, p.benefit_id), p))
            .collect();

        Self {
            cards,
            benefits_by_card,
            redemptions,
            preferences,
        }
    }

    fn card_for(&self, user_card: &UserCard) -> Result<&'a Card> {
        self.cards
            .get(&user_card.card_id)
            .copied()
            .ok_or_else(|| Error::not_found("card", user_card.card_id))
    }

    fn benefits_for(&self, user_card: &UserCard) -> &[&'a Benefit] {
        self.benefits_by_card
            .get(&user_card.card_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn rows_for(&self, user_card: &UserCard, benefit: &Benefit) -> &[&'a Redemption] {
        self.redemptions
            .get(&(user_card.id, benefit.id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn resolved(&self, user_card: &UserCard, benefit: &Benefit) -> preference::ResolvedPreference {
        preference::resolve(
            benefit,
            self.preferences.get(&(user_card.id, benefit.id)).copied(),
        )
    }

    /// Rows of a pair attributed to calendar `year`.
    fn rows_in_year(
        &self,
        user_card: &UserCard,
        benefit: &Benefit,
        year: i32,
    ) -> impl Iterator<Item = &'a Redemption> {
        let schedule = benefit.schedule;
        let anchor = user_card.card_open_date;
        self.rows_for(user_card, benefit)
            .iter()
            .copied()
            .filter(move |row| {
                period::attributed_year(schedule, row.period, anchor, row.redeemed_at.date_naive())
                    == year
            })
    }

    /// Status in the period containing `today`. A ledger row above the
    /// benefit value is reported, not clamped.
    fn status(
        &self,
        user_card: &UserCard,
        benefit: &Benefit,
        today: NaiveDate,
    ) -> Result<BenefitStatus> {
        let anchor = user_card.card_open_date;
        let current = period::current_period(benefit.schedule, anchor, today);
        let flags = self.resolved(user_card, benefit);

        let ledger_amount = self
            .rows_for(user_card, benefit)
            .iter()
            .find(|row| row.period == current)
            .map_or(Decimal::ZERO, |row| row.amount_redeemed);
        if ledger_amount > benefit.value {
            return Err(Error::InvalidStoredValue {
                field: "benefit_redemptions.amount_redeemed",
                value: ledger_amount.to_string(),
            });
        }
        let remaining = benefit.value - ledger_amount;
        let (amount_redeemed, amount_remaining) =
            preference::apply_auto_redeem(benefit, ledger_amount, remaining, flags.auto_redeem);

        Ok(BenefitStatus {
            benefit: benefit.clone(),
            user_card: user_card.clone(),
            period: current,
            resets_at: period::reset_date(benefit.schedule, anchor, today),
            auto_redeem: flags.auto_redeem,
            hidden: flags.hidden,
            amount_redeemed,
            amount_remaining,
        })
    }
}

/// Where one benefit of one user card stands in its current period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitStatus {
    /// The benefit
    pub benefit: Benefit,
    /// The user card it is offered on
    pub user_card: UserCard,
    /// Period containing the requested day
    pub period: PeriodKey,
    /// Start of the next period, `None` for one-time benefits
    pub resets_at: Option<NaiveDate>,
    /// Auto-redeem flag in effect
    pub auto_redeem: bool,
    /// Hidden flag in effect
    pub hidden: bool,
    /// Redeemed this period, after the auto-redeem override
    pub amount_redeemed: Decimal,
    /// Left to redeem this period, after the auto-redeem override
    pub amount_remaining: Decimal,
}

impl BenefitStatus {
    /// True when nothing is left to redeem this period.
    #[must_use]
    pub fn is_redeemed(&self) -> bool {
        self.amount_remaining <= Decimal::ZERO
    }
}

/// A user card with the status of every benefit on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCardWithBenefits {
    /// The user card
    pub user_card: UserCard,
    /// Its catalog card
    pub card: Card,
    /// Status of every benefit, ordered by name
    pub benefits: Vec<BenefitStatus>,
}

/// Yearly numbers for one benefit on one user card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitSummary {
    /// The benefit
    pub benefit: Benefit,
    /// Ledger rows within the year, partial or full
    pub redeemed_count: u32,
    /// Periods per year
    pub total_count: u32,
    /// `value × redeemed_count`
    pub redeemed_value: Decimal,
    /// `value × total_count`
    pub total_value: Decimal,
}

/// Yearly numbers for one user card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSummary {
    /// The user card
    pub user_card: UserCard,
    /// Its catalog card
    pub card: Card,
    /// Calendar year summarized
    pub year: i32,
    /// One entry per benefit of the card
    pub benefits: Vec<BenefitSummary>,
    /// Sum of `redeemed_value`
    pub total_redeemed: Decimal,
    /// Sum of `total_value`
    pub total_available: Decimal,
}

/// Yearly numbers across all of a user's cards, hidden benefits excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnualSummary {
    /// Calendar year summarized
    pub year: i32,
    /// Ledger amounts within the year, full yearly value for auto-redeem
    pub total_redeemed: Decimal,
    /// Yearly value of every visible benefit
    pub total_available: Decimal,
    /// `total_available - total_redeemed`
    pub outstanding: Decimal,
    /// Periods with a ledger row, all periods for auto-redeem
    pub redeemed_count: u32,
    /// Periods per year summed over visible benefits
    pub total_count: u32,
    /// Sum of the cards' annual fees
    pub total_annual_fees: Decimal,
}

/// Benefits that still have value left this period, soonest reset first.
///
/// Hidden benefits are left out unless `show_hidden` is set. Entries without a
/// reset date come last; ties are broken by value, highest first.
///
/// # Errors
/// [`Error::InvalidStoredValue`] if a current-period ledger row exceeds the
/// benefit value.
pub fn available_benefits(
    snapshot: &Snapshot,
    today: NaiveDate,
    show_hidden: bool,
) -> Result<Vec<BenefitStatus>> {
    let index = SnapshotIndex::build(snapshot);

    let statuses = snapshot
        .user_cards
        .iter()
        .flat_map(|uc| index.benefits_for(uc).iter().map(move |b| (uc, *b)))
        .map(|(uc, b)| index.status(uc, b, today))
        .collect::<Result<Vec<_>>>()?;
    let mut available: Vec<BenefitStatus> = statuses
        .into_iter()
        .filter(|status| show_hidden || !status.hidden)
        .filter(|status| status.amount_remaining > Decimal::ZERO)
        .collect();

    available.sort_by(|a, b| {
        a.resets_at
            .is_none()
            .cmp(&b.resets_at.is_none())
            .then(a.resets_at.cmp(&b.resets_at))
            .then(b.benefit.value.cmp(&a.benefit.value))
    });
    Ok(available)
}

/// Every user card with the status of all its benefits, including hidden and
/// fully redeemed ones.
pub fn user_cards_with_benefits(
    snapshot: &Snapshot,
    today: NaiveDate,
) -> Result<Vec<UserCardWithBenefits>> {
    let index = SnapshotIndex::build(snapshot);

    snapshot
        .user_cards
        .iter()
        .map(|uc| {
            Ok(UserCardWithBenefits {
                user_card: uc.clone(),
                card: index.card_for(uc)?.clone(),
                benefits: index
                    .benefits_for(uc)
                    .iter()
                    .map(|b| index.status(uc, b, today))
                    .collect::<Result<_>>()?,
            })
        })
        .collect()
}

/// Yearly summary of one user card. Preferences are not applied here.
///
/// `redeemed_count` counts ledger rows, so a partial redemption counts the
/// same as a full one.
pub fn card_summary(snapshot: &Snapshot, user_card_id: i64, year: i32) -> Result<CardSummary> {
    let index = SnapshotIndex::build(snapshot);
    let user_card = snapshot
        .user_cards
        .iter()
        .find(|uc| uc.id == user_card_id)
        .ok_or_else(|| Error::not_found("user card", user_card_id))?;
    let card = index.card_for(user_card)?;

    let mut total_redeemed = Decimal::ZERO;
    let mut total_available = Decimal::ZERO;
    let benefits: Vec<BenefitSummary> = index
        .benefits_for(user_card)
        .iter()
        .map(|benefit| {
            let total_count = period::periods_per_year(benefit.schedule);
            let redeemed_count = index
                .rows_in_year(user_card, benefit, year)
                .fold(0_u32, |n, _| n + 1);
            let redeemed_value = benefit.value * Decimal::from(redeemed_count);
            let total_value = benefit.value * Decimal::from(total_count);

            total_redeemed += redeemed_value;
            total_available += total_value;

            BenefitSummary {
                benefit: (*benefit).clone(),
                redeemed_count,
                total_count,
                redeemed_value,
                total_value,
            }
        })
        .collect();

    Ok(CardSummary {
        user_card: user_card.clone(),
        card: card.clone(),
        year,
        benefits,
        total_redeemed,
        total_available,
    })
}

/// Annual summary across every card of the snapshot.
pub fn annual_summary(snapshot: &Snapshot, year: i32) -> Result<AnnualSummary> {
    let index = SnapshotIndex::build(snapshot);
    let mut summary = AnnualSummary {
        year,
        ..Default::default()
    };

    for user_card in &snapshot.user_cards {
        summary.total_annual_fees += index.card_for(user_card)?.annual_fee;

        for benefit in index.benefits_for(user_card) {
            let flags = index.resolved(user_card, benefit);
            if flags.hidden {
                continue;
            }

            let yearly_count = period::periods_per_year(benefit.schedule);
            let total_value = benefit.value * Decimal::from(yearly_count);

            let (redeemed_value, redeemed_count) = if flags.auto_redeem {
                (total_value, yearly_count)
            } else {
                index
                    .rows_in_year(user_card, benefit, year)
                    .fold((Decimal::ZERO, 0_u32), |(sum, n), row| {
                        (sum + row.amount_redeemed, n + 1)
                    })
            };

            summary.total_available += total_value;
            summary.total_redeemed += redeemed_value;
            summary.total_count += yearly_count;
            summary.redeemed_count += redeemed_count;
        }
    }

    summary.outstanding = summary.total_available - summary.total_redeemed;
    Ok(summary)
}

/// Loads and builds the dashboard list for `user_id`.
#[instrument(skip(db, clock))]
pub async fn load_available_benefits<C>(
    db: &C,
    clock: &impl Clock,
    user_id: &str,
    show_hidden: bool,
) -> Result<Vec<BenefitStatus>>
where
    C: ConnectionTrait,
{
    let snapshot = load_user_snapshot(db, user_id).await?;
    available_benefits(&snapshot, clock.today(), show_hidden)
}

/// Loads every card of `user_id` with the status of its benefits.
#[instrument(skip(db, clock))]
pub async fn load_user_cards_with_benefits<C>(
    db: &C,
    clock: &impl Clock,
    user_id: &str,
) -> Result<Vec<UserCardWithBenefits>>
where
    C: ConnectionTrait,
{
    let snapshot = load_user_snapshot(db, user_id).await?;
    user_cards_with_benefits(&snapshot, clock.today())
}

/// Loads the yearly summary of one of `user_id`'s cards.
#[instrument(skip(db))]
pub async fn load_card_summary<C>(
    db: &C,
    user_id: &str,
    user_card_id: i64,
    year: i32,
) -> Result<CardSummary>
where
    C: ConnectionTrait,
{
    let snapshot = load_user_snapshot(db, user_id).await?;
    card_summary(&snapshot, user_card_id, year)
}

/// Loads the annual summary across all of `user_id`'s cards.
#[instrument(skip(db))]
pub async fn load_annual_summary<C>(db: &C, user_id: &str, year: i32) -> Result<AnnualSummary>
where
    C: ConnectionTrait,
{
    let snapshot = load_user_snapshot(db, user_id).await?;
    annual_summary(&snapshot, year)
}
