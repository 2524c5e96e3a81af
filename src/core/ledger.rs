//! Redemption ledger - Handles redeeming and un-redeeming benefit value.
//!
//! Redemption accumulates partial credit within one period: a $10 benefit can
//! be consumed as $3 + $7, and both land in the same ledger row. Marking a
//! benefit as fully redeemed is the case where the requested amount is left
//! out and the whole remaining value is applied.
//!
//! The decision is made by the pure [`plan_redeem`] / [`plan_unredeem`]
//! functions. Persisting it is a read-modify-write, so the stored update is a
//! compare-and-set on the previous amount and inserts rely on the unique
//! `(user_card_id, benefit_id, period_key)` index. A lost race is retried from
//! a fresh read, up to [`MAX_REDEEM_ATTEMPTS`] times.

use crate::{
    core::{catalog, clock::Clock, period, period::PeriodKey, user_card},
    entities::{BenefitRedemption, benefit_redemption},
    errors::{Error, Result},
    models::{Benefit, Redemption, UserCard, convert_all, money_text},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{RuntimeErr, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info, instrument, warn};

/// How many times a redemption is attempted before giving up on a contended row.
pub const MAX_REDEEM_ATTEMPTS: u32 = 3;

/// The outcome of validating a redemption request against the current period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionPlan {
    /// Period the redemption applies to
    pub period: PeriodKey,
    /// Amount being applied by this request
    pub amount: Decimal,
    /// Total redeemed in the period once applied
    pub new_total: Decimal,
    /// Ledger row to update, or `None` when a new row is inserted
    pub existing_id: Option<i64>,
}

impl RedemptionPlan {
    /// True when applying the plan inserts a row.
    #[must_use]
    pub const fn is_new_row(&self) -> bool {
        self.existing_id.is_none()
    }
}

fn row_for_period<'a>(
    benefit: &Benefit,
    user_card: &UserCard,
    period: PeriodKey,
    rows: &'a [Redemption],
) -> Option<&'a Redemption> {
    rows.iter().find(|row| {
        row.user_card_id == user_card.id && row.benefit_id == benefit.id && row.period == period
    })
}

/// Decides how a redemption of `requested` (or everything that is left, when
/// `None`) applies to the period containing `today`.
///
/// `rows` may contain any ledger rows; only the one for this user card,
/// benefit and current period is used.
///
/// # Errors
/// [`Error::InvalidAmount`] when the amount is not positive or exceeds what
/// remains in the period. Nothing is clamped.
pub fn plan_redeem(
    benefit: &Benefit,
    user_card: &UserCard,
    today: NaiveDate,
    requested: Option<Decimal>,
    rows: &[Redemption],
) -> Result<RedemptionPlan> {
    let period = period::current_period(benefit.schedule, user_card.card_open_date, today);
    let existing = row_for_period(benefit, user_card, period, rows);

    let already = existing.map_or(Decimal::ZERO, |row| row.amount_redeemed);
    let remaining = benefit.value - already;
    let amount = requested.unwrap_or(remaining);

    if amount <= Decimal::ZERO || amount > remaining {
        return Err(Error::InvalidAmount { amount, remaining });
    }

    Ok(RedemptionPlan {
        period,
        amount,
        new_total: already + amount,
        existing_id: existing.map(|row| row.id),
    })
}

/// The ledger row to delete to un-redeem the period containing `today`.
///
/// Only the current period is ever touched; `None` means there is nothing to
/// undo.
#[must_use]
pub fn plan_unredeem(
    benefit: &Benefit,
    user_card: &UserCard,
    today: NaiveDate,
    rows: &[Redemption],
) -> Option<i64> {
    let period = period::current_period(benefit.schedule, user_card.card_open_date, today);
    row_for_period(benefit, user_card, period, rows).map(|row| row.id)
}

async fn period_rows<C>(
    db: &C,
    user_card_id: i64,
    benefit_id: i64,
    period: PeriodKey,
) -> std::result::Result<Vec<benefit_redemption::Model>, DbErr>
where
    C: ConnectionTrait,
{
    BenefitRedemption::find()
        .filter(benefit_redemption::Column::UserCardId.eq(user_card_id))
        .filter(benefit_redemption::Column::BenefitId.eq(benefit_id))
        .filter(benefit_redemption::Column::PeriodKey.eq(period.storage_key()))
        .all(db)
        .await
}

// SQLite primary result codes for a contended database file
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// True when `err` means another writer got to the ledger first: the unique
/// period index was hit, or `SQLite` refused the write lock.
fn lost_race(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    match err {
        DbErr::Conn(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .and_then(|code| code.parse::<i32>().ok())
            // Extended codes keep the primary code in the low byte
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

/// Maps a lost race to `Ok(None)` and passes every other error through.
fn race_to_none<T>(result: std::result::Result<T, DbErr>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if lost_race(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Writes a plan built from a read of the period's row. `stored_amount` is the
/// raw amount text that read saw, and the update only lands while it is still
/// stored. `Ok(None)` means another writer changed the row in between.
async fn apply_plan<C>(
    db: &C,
    benefit: &Benefit,
    user_card: &UserCard,
    plan: &RedemptionPlan,
    stored_amount: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<Redemption>>
where
    C: ConnectionTrait,
{
    if let (Some(id), Some(previous)) = (plan.existing_id, stored_amount) {
        let updated = BenefitRedemption::update_many()
            .col_expr(
                benefit_redemption::Column::AmountRedeemed,
                Expr::value(money_text(plan.new_total)),
            )
            .filter(benefit_redemption::Column::Id.eq(id))
            .filter(benefit_redemption::Column::AmountRedeemed.eq(previous))
            .exec(db)
            .await;

        match race_to_none(updated)? {
            Some(result) if result.rows_affected > 0 => {}
            _ => return Ok(None),
        }

        let updated = BenefitRedemption::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("redemption", id))?;
        return Ok(Some(updated.try_into()?));
    }

    let (year, month, quarter, half) = plan.period.columns();
    let inserted = benefit_redemption::ActiveModel {
        user_card_id: Set(user_card.id),
        benefit_id: Set(benefit.id),
        period_key: Set(plan.period.storage_key()),
        period_year: Set(year),
        period_month: Set(month),
        period_quarter: Set(quarter),
        period_half: Set(half),
        amount_redeemed: Set(money_text(plan.new_total)),
        redeemed_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;

    race_to_none(inserted)?
        .map(Redemption::try_from)
        .transpose()
}

/// One redemption attempt: reads the period's row, plans, and writes.
/// `Ok(None)` means another writer changed the row between the read and the
/// write.
pub(crate) async fn try_redeem<C>(
    db: &C,
    clock: &impl Clock,
    benefit: &Benefit,
    user_card: &UserCard,
    requested: Option<Decimal>,
) -> Result<Option<Redemption>>
where
    C: ConnectionTrait,
{
    let now = clock.now();
    let today = now.date_naive();
    let period = period::current_period(benefit.schedule, user_card.card_open_date, today);

    let Some(rows) = race_to_none(period_rows(db, user_card.id, benefit.id, period).await)? else {
        return Ok(None);
    };
    let stored_amount = rows.first().map(|row| row.amount_redeemed.clone());
    let existing: Vec<Redemption> = convert_all(rows)?;
    let plan = plan_redeem(benefit, user_card, today, requested, &existing)?;

    apply_plan(db, benefit, user_card, &plan, stored_amount.as_deref(), now).await
}

/// Runs `try_redeem` in its own transaction, committing only a successful write.
async fn redeem_once(
    db: &DatabaseConnection,
    clock: &impl Clock,
    benefit: &Benefit,
    user_card: &UserCard,
    requested: Option<Decimal>,
) -> Result<Option<Redemption>> {
    let Some(txn) = race_to_none(db.begin().await)? else {
        return Ok(None);
    };
    match try_redeem(&txn, clock, benefit, user_card, requested).await {
        Ok(Some(redemption)) => Ok(race_to_none(txn.commit().await)?.map(|()| redemption)),
        Ok(None) => {
            txn.rollback().await?;
            Ok(None)
        }
        Err(err) => {
            txn.rollback().await?;
            Err(err)
        }
    }
}

/// Calls `attempt` until it returns a redemption, at most
/// [`MAX_REDEEM_ATTEMPTS`] times. Errors end the loop immediately.
pub(crate) async fn retry_lost_races<F, Fut>(
    user_card_id: i64,
    benefit_id: i64,
    mut attempt: F,
) -> Result<Redemption>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<Redemption>>>,
{
    for n in 1..=MAX_REDEEM_ATTEMPTS {
        if let Some(redemption) = attempt().await? {
            return Ok(redemption);
        }
        warn!(
            "Redemption of benefit {} on user card {} lost a race (attempt {}/{})",
            benefit_id, user_card_id, n, MAX_REDEEM_ATTEMPTS
        );
    }

    Err(Error::RedemptionConflict {
        user_card_id,
        benefit_id,
        attempts: MAX_REDEEM_ATTEMPTS,
    })
}

/// Redeems `requested` of a benefit (or all that remains, when `None`) for the
/// current period of a user's card.
///
/// # Errors
/// - [`Error::NotFound`] if the user card is not the user's, or the benefit is
///   not offered by that card
/// - [`Error::InvalidAmount`] if the amount is not positive or exceeds what is left
/// - [`Error::RedemptionConflict`] if concurrent writers kept winning the race
#[instrument(skip(db, clock))]
pub async fn redeem_benefit(
    db: &DatabaseConnection,
    clock: &impl Clock,
    user_id: &str,
    user_card_id: i64,
    benefit_id: i64,
    requested: Option<Decimal>,
) -> Result<Redemption> {
    let user_card = user_card::get_owned_user_card(db, user_id, user_card_id).await?;
    let benefit = catalog::get_benefit_for_card(db, user_card.card_id, benefit_id).await?;

    let redemption = retry_lost_races(user_card.id, benefit.id, || {
        redeem_once(db, clock, &benefit, &user_card, requested)
    })
    .await?;

    info!(
        "Redeemed benefit {} on user card {} for period {}: total {} of {}",
        benefit.id, user_card.id, redemption.period, redemption.amount_redeemed, benefit.value
    );
    Ok(redemption)
}

/// Removes the current period's redemption of a benefit on a user's card.
///
/// Returns the deleted row's ID, or `None` if the period had not been redeemed,
/// which is not an error. Earlier periods are never touched.
#[instrument(skip(db, clock))]
pub async fn unredeem_benefit(
    db: &DatabaseConnection,
    clock: &impl Clock,
    user_id: &str,
    user_card_id: i64,
    benefit_id: i64,
) -> Result<Option<i64>> {
    let user_card = user_card::get_owned_user_card(db, user_id, user_card_id).await?;
    let benefit = catalog::get_benefit_for_card(db, user_card.card_id, benefit_id).await?;
    let today = clock.today();
    let period = period::current_period(benefit.schedule, user_card.card_open_date, today);

    let rows: Vec<Redemption> =
        convert_all(period_rows(db, user_card.id, benefit.id, period).await?)?;
    let Some(row_id) = plan_unredeem(&benefit, &user_card, today, &rows) else {
        debug!(
            "Nothing to un-redeem for benefit {} on user card {} in period {}",
            benefit.id, user_card.id, period
        );
        return Ok(None);
    };

    BenefitRedemption::delete_many()
        .filter(benefit_redemption::Column::Id.eq(row_id))
        .exec(db)
        .await?;
    info!(
        "Un-redeemed benefit {} on user card {} for period {}",
        benefit.id, user_card.id, period
    );
    Ok(Some(row_id))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::period::Schedule;
    use crate::test_utils::*;

    fn monthly_benefit(value: i64) -> Benefit {
        Benefit {
            id: 7,
            card_id: 1,
            name: "Dining".to_string(),
            description: None,
            value: Decimal::from(value),
            schedule: Schedule::Monthly,
        }
    }

    fn user_card() -> UserCard {
        UserCard {
            id: 3,
            user_id: "alice".to_string(),
            card_id: 1,
            card_open_date: date(2020, 1, 1),
            nickname: None,
        }
    }

    fn row(id: i64, period: PeriodKey, amount: i64) -> Redemption {
        Redemption {
            id,
            user_card_id: 3,
            benefit_id: 7,
            period,
            amount_redeemed: Decimal::from(amount),
            redeemed_at: Utc::now(),
        }
    }

    const MARCH: PeriodKey = PeriodKey::YearMonth {
        year: 2024,
        month: 3,
    };
    const FEBRUARY: PeriodKey = PeriodKey::YearMonth {
        year: 2024,
        month: 2,
    };

    #[test]
    fn test_plan_redeem_defaults_to_full_remaining() {
        let plan = plan_redeem(&monthly_benefit(25), &user_card(), date(2024, 3, 15), None, &[])
            .unwrap();
        assert_eq!(plan.period, MARCH);
        assert_eq!(plan.amount, Decimal::from(25));
        assert_eq!(plan.new_total, Decimal::from(25));
        assert!(plan.is_new_row());
    }

    #[test]
    fn test_plan_redeem_accumulates_into_existing_row() {
        let rows = [row(1, FEBRUARY, 10), row(2, MARCH, 3)];
        let plan = plan_redeem(
            &monthly_benefit(10),
            &user_card(),
            date(2024, 3, 15),
            Some(Decimal::from(7)),
            &rows,
        )
        .unwrap();
        assert_eq!(plan.existing_id, Some(2));
        assert_eq!(plan.new_total, Decimal::from(10));
    }

    #[test]
    fn test_plan_redeem_rejects_invalid_amounts() {
        let benefit = monthly_benefit(10);
        let today = date(2024, 3, 15);
        let rows = [row(2, MARCH, 4)];

        for requested in [Decimal::ZERO, Decimal::from(-1), Decimal::from(7)] {
            let result = plan_redeem(&benefit, &user_card(), today, Some(requested), &rows);
            assert!(matches!(
                result,
                Err(Error::InvalidAmount { remaining, .. }) if remaining == Decimal::from(6)
            ));
        }

        // Fully redeemed: the default amount is zero and is rejected too
        let full = [row(2, MARCH, 10)];
        assert!(matches!(
            plan_redeem(&benefit, &user_card(), today, None, &full),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_plan_unredeem_only_touches_current_period() {
        let benefit = monthly_benefit(10);
        let today = date(2024, 3, 15);

        assert_eq!(
            plan_unredeem(&benefit, &user_card(), today, &[row(1, FEBRUARY, 10)]),
            None
        );
        assert_eq!(
            plan_unredeem(
                &benefit,
                &user_card(),
                today,
                &[row(1, FEBRUARY, 10), row(2, MARCH, 10)]
            ),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_partial_redemptions_share_one_row() -> Result<()> {
        let (db, _card, benefit, user_card) = setup_with_user_card("10", "monthly").await?;
        let clock = FixedClock::on(date(2024, 3, 15));

        let first =
            redeem_benefit(&db, &clock, "alice", user_card.id, benefit.id, Some(Decimal::from(3)))
                .await?;
        let second =
            redeem_benefit(&db, &clock, "alice", user_card.id, benefit.id, Some(Decimal::from(7)))
                .await?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.amount_redeemed, Decimal::from(10));
        assert_eq!(BenefitRedemption::find().count(&db).await?, 1);

        let over = redeem_benefit(
            &db,
            &clock,
            "alice",
            user_card.id,
            benefit.id,
            Some(Decimal::new(1, 2)),
        )
        .await;
        assert!(matches!(over, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_unredeem_restores_current_period_and_keeps_history() -> Result<()> {
        let (db, _card, benefit, user_card) = setup_with_user_card("25", "monthly").await?;
        let february = FixedClock::on(date(2024, 2, 10));
        let march = FixedClock::on(date(2024, 3, 15));

        redeem_benefit(&db, &february, "alice", user_card.id, benefit.id, None).await?;
        let redeemed = redeem_benefit(&db, &march, "alice", user_card.id, benefit.id, None).await?;
        assert_eq!(redeemed.period, MARCH);
        assert_eq!(redeemed.amount_redeemed, Decimal::from(25));

        let deleted = unredeem_benefit(&db, &march, "alice", user_card.id, benefit.id).await?;
        assert_eq!(deleted, Some(redeemed.id));

        let remaining: Vec<Redemption> = convert_all(BenefitRedemption::find().all(&db).await?)?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].period, FEBRUARY);

        // Idempotent
        let again = unredeem_benefit(&db, &march, "alice", user_card.id, benefit.id).await?;
        assert_eq!(again, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_unredeem_redeem_matches_single_redeem() -> Result<()> {
        let (db, _card, benefit, user_card) = setup_with_user_card("10", "quarterly").await?;
        let clock = FixedClock::on(date(2024, 8, 1));

        redeem_benefit(&db, &clock, "alice", user_card.id, benefit.id, Some(Decimal::from(4)))
            .await?;
        unredeem_benefit(&db, &clock, "alice", user_card.id, benefit.id).await?;
        let last =
            redeem_benefit(&db, &clock, "alice", user_card.id, benefit.id, Some(Decimal::from(4)))
                .await?;

        let rows: Vec<Redemption> = convert_all(BenefitRedemption::find().all(&db).await?)?;
        assert_eq!(rows, vec![last.clone()]);
        assert_eq!(last.amount_redeemed, Decimal::from(4));
        assert_eq!(
            last.period,
            PeriodKey::YearQuarter {
                year: 2024,
                quarter: 3
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_requires_ownership_and_card_benefit() -> Result<()> {
        let (db, _card, benefit, user_card) = setup_with_user_card("10", "monthly").await?;
        let other_card = create_test_card(&db, "Other").await?;
        let foreign_benefit =
            create_test_benefit(&db, other_card.id, "Lounge", "50", "calendar_year").await?;
        let clock = FixedClock::on(date(2024, 3, 15));

        let wrong_user = redeem_benefit(&db, &clock, "mallory", user_card.id, benefit.id, None).await;
        assert!(matches!(
            wrong_user,
            Err(Error::NotFound {
                entity: "user card",
                ..
            })
        ));

        let wrong_benefit =
            redeem_benefit(&db, &clock, "alice", user_card.id, foreign_benefit.id, None).await;
        assert!(matches!(
            wrong_benefit,
            Err(Error::NotFound {
                entity: "benefit",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_one_time_benefit_once() -> Result<()> {
        let (db, _card, benefit, user_card) = setup_with_user_card("100", "one_time").await?;

        let first = redeem_benefit(
            &db,
            &FixedClock::on(date(2023, 5, 1)),
            "alice",
            user_card.id,
            benefit.id,
            None,
        )
        .await?;
        assert_eq!(first.period, PeriodKey::OneTime);

        // A later year is still the same lifetime period
        let later = redeem_benefit(
            &db,
            &FixedClock::on(date(2026, 5, 1)),
            "alice",
            user_card.id,
            benefit.id,
            None,
        )
        .await;
        assert!(matches!(later, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_update_loses_to_concurrent_writer() -> Result<()> {
        let (db, _card, benefit, user_card) = setup_with_user_card("10", "monthly").await?;
        let clock = FixedClock::on(date(2024, 3, 15));

        let first =
            redeem_benefit(&db, &clock, "alice", user_card.id, benefit.id, Some(Decimal::from(3)))
                .await?;
        // Planned from the $3 row, then another writer adds $4 before the write
        let stale = plan_redeem(
            &benefit,
            &user_card,
            clock.today(),
            Some(Decimal::from(2)),
            std::slice::from_ref(&first),
        )?;
        redeem_benefit(&db, &clock, "alice", user_card.id, benefit.id, Some(Decimal::from(4)))
            .await?;

        let applied = apply_plan(&db, &benefit, &user_card, &stale, Some("3"), clock.now()).await?;
        assert_eq!(applied, None);

        let stored = BenefitRedemption::find_by_id(first.id).one(&db).await?.unwrap();
        assert_eq!(stored.amount_redeemed, "7");
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_period_insert_loses_to_concurrent_writer() -> Result<()> {
        let (db, _card, benefit, user_card) = setup_with_user_card("10", "monthly").await?;
        let clock = FixedClock::on(date(2024, 3, 15));

        // Planned while the period had no row
        let fresh = plan_redeem(&benefit, &user_card, clock.today(), Some(Decimal::from(5)), &[])?;
        assert!(fresh.is_new_row());
        redeem_benefit(&db, &clock, "alice", user_card.id, benefit.id, Some(Decimal::from(2)))
            .await?;

        let applied = apply_plan(&db, &benefit, &user_card, &fresh, None, clock.now()).await?;
        assert_eq!(applied, None);

        let rows: Vec<Redemption> = convert_all(BenefitRedemption::find().all(&db).await?)?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount_redeemed, Decimal::from(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = std::cell::Cell::new(0);
        let result = retry_lost_races(3, 7, || {
            calls.set(calls.get() + 1);
            async { Ok(None) }
        })
        .await;

        assert!(matches!(
            result,
            Err(Error::RedemptionConflict {
                user_card_id: 3,
                benefit_id: 7,
                attempts: MAX_REDEEM_ATTEMPTS,
            })
        ));
        assert_eq!(calls.get(), MAX_REDEEM_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_retry_stops_at_first_win_or_error() {
        let calls = std::cell::Cell::new(0);
        let won = retry_lost_races(3, 7, || {
            calls.set(calls.get() + 1);
            let outcome = (calls.get() == 2).then(|| row(1, MARCH, 10));
            async move { Ok(outcome) }
        })
        .await
        .unwrap();
        assert_eq!(won.id, 1);
        assert_eq!(calls.get(), 2);

        calls.set(0);
        let failed = retry_lost_races(3, 7, || {
            calls.set(calls.get() + 1);
            async {
                Err(Error::InvalidAmount {
                    amount: Decimal::ONE,
                    remaining: Decimal::ZERO,
                })
            }
        })
        .await;
        assert!(matches!(failed, Err(Error::InvalidAmount { .. })));
        assert_eq!(calls.get(), 1);
    }

    /// A fresh file-backed database, so each writer gets its own connection.
    async fn setup_file_db() -> Result<(DatabaseConnection, std::path::PathBuf)> {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let path = std::env::temp_dir().join(format!(
            "card-perks-ledger-{}-{nanos}.sqlite",
            std::process::id()
        ));
        let db = sea_orm::Database::connect(format!("sqlite://{}?mode=rwc", path.display())).await?;
        crate::config::database::create_tables(&db).await?;
        Ok((db, path))
    }

    fn remove_file_db(path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeems_never_exceed_value() -> Result<()> {
        let (db, path) = setup_file_db().await?;
        let card = create_test_card(&db, "Gold").await?;
        let benefit = create_test_benefit(&db, card.id, "Dining", "10", "monthly").await?;
        let user_card = create_test_user_card(&db, "alice", card.id, date(2020, 1, 1)).await?;
        let clock = FixedClock::on(date(2024, 3, 15));
        let (user_card_id, benefit_id) = (user_card.id, benefit.id);

        // Each writer redeems $1 until the $10 period is used up
        let writers: Vec<_> = (0..16)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    let mut wins = 0_u32;
                    loop {
                        let redeemed = redeem_benefit(
                            &db,
                            &clock,
                            "alice",
                            user_card_id,
                            benefit_id,
                            Some(Decimal::ONE),
                        )
                        .await;
                        match redeemed {
                            Ok(_) => wins += 1,
                            Err(Error::RedemptionConflict { .. }) => {}
                            Err(Error::InvalidAmount { .. }) => return Ok(wins),
                            Err(err) => return Err(err),
                        }
                    }
                })
            })
            .collect();

        let mut wins = 0;
        for writer in writers {
            wins += writer.await.unwrap()?;
        }
        let rows: Vec<Redemption> = convert_all(BenefitRedemption::find().all(&db).await?)?;
        db.close().await?;
        remove_file_db(&path);

        assert_eq!(wins, 10);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount_redeemed, Decimal::from(10));
        assert_eq!(
            rows[0].period,
            PeriodKey::YearMonth {
                year: 2024,
                month: 3
            }
        );
        Ok(())
    }
}
