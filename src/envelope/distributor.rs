//! Envelope Distributor
//!
//! Pool lifecycle: send (create + debit), receive (split + claim + credit)
//! and refund of expired stock. Every mutation runs in one transaction;
//! contention between claimants is resolved by the conditional stock write
//! alone, no row lock is held across claims.

use chrono::{Duration, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{
    new_business_no, AccountType, Amount, ChangeType, DomainError, EnvelopeStatus, EnvelopeType,
    OrderType, PayStatus, TransferAmount, ValidationError,
};
use crate::ledger::Ledger;
use crate::transfer::{TradeParticipant, TransferCommand, TransferCoordinator};

use super::model::{
    flag_luckiest, ClaimView, Envelope, EnvelopeActivity, EnvelopeClaim, NewClaim, NewEnvelope,
};
use super::repository;
use super::split::{self, Stock};
use super::Page;

pub const DEFAULT_BLESSING: &str = "恭喜发财";

/// Lifetime of a pool (and of a refund pool) from creation
pub const ENVELOPE_TTL_HOURS: i64 = 24;

/// Request to create a pool
#[derive(Debug, Clone)]
pub struct SendOut {
    pub user_id: String,
    pub username: String,
    pub envelope_type: EnvelopeType,
    /// Per-share amount for General pools, total for Lucky pools
    pub amount: Amount,
    pub quantity: u32,
    pub blessing: String,
}

/// Who is claiming
#[derive(Debug, Clone)]
pub struct Receiver {
    pub user_id: String,
    pub username: String,
}

/// Result of refunding one expired pool
#[derive(Debug, Clone, PartialEq)]
pub enum RefundOutcome {
    /// Unclaimed stock credited back; carries the derived refund pool
    Refunded(Envelope),
    /// Pool was already handled or its stock moved since it was scanned
    Skipped,
}

/// Where shareable envelope links point
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub domain: String,
    pub path: String,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            domain: "http://localhost".to_string(),
            path: "/v1/envelope/link".to_string(),
        }
    }
}

impl LinkSettings {
    pub fn link_for(&self, envelope_no: &str) -> String {
        format!("{}{}/{}", self.domain, self.path, envelope_no)
    }
}

#[derive(Debug, Clone)]
pub struct EnvelopeDistributor {
    pool: PgPool,
    transfer: TransferCoordinator,
    /// Intermediary pool-holding account, recorded as counterparty
    system: TradeParticipant,
    links: LinkSettings,
}

impl EnvelopeDistributor {
    pub fn new(transfer: TransferCoordinator, system: TradeParticipant) -> Self {
        Self {
            pool: transfer.ledger().pool().clone(),
            transfer,
            system,
            links: LinkSettings::default(),
        }
    }

    pub fn with_links(mut self, links: LinkSettings) -> Self {
        self.links = links;
        self
    }

    fn ledger(&self) -> &Ledger {
        self.transfer.ledger()
    }

    async fn envelope_account(&self, user_id: &str) -> Result<TradeParticipant, DomainError> {
        let account = self
            .ledger()
            .get_account_by_user(user_id, AccountType::Envelope)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(format!("envelope account of {}", user_id)))?;

        Ok(TradeParticipant::new(
            account.account_no,
            account.user_id,
            account.username,
        ))
    }

    /// Create a pool and debit its total from the owner in one transaction.
    ///
    /// If the debit is not a `Success` nothing is persisted.
    pub async fn send_out(&self, request: SendOut) -> Result<EnvelopeActivity, DomainError> {
        if request.quantity == 0 {
            return Err(ValidationError::new("quantity", "must be at least 1").into());
        }
        let quantity = i32::try_from(request.quantity)
            .map_err(|_| ValidationError::new("quantity", "is too large"))?;

        let (total, amount_one) = match request.envelope_type {
            EnvelopeType::General => {
                let total = request
                    .amount
                    .checked_mul(request.quantity)
                    .map_err(|e| ValidationError::new("amount", e.to_string()))?;
                (total, request.amount.value())
            }
            EnvelopeType::Lucky => {
                if request.amount.to_minor_units() < i64::from(request.quantity) {
                    return Err(ValidationError::new(
                        "amount",
                        "must give every share at least 0.01",
                    )
                    .into());
                }
                (request.amount, rust_decimal::Decimal::ZERO)
            }
        };

        let owner = self.envelope_account(&request.user_id).await?;

        let blessing = if request.blessing.trim().is_empty() {
            DEFAULT_BLESSING.to_string()
        } else {
            request.blessing
        };

        let new_envelope = NewEnvelope {
            envelope_no: new_business_no(),
            envelope_type: request.envelope_type,
            user_id: owner.user_id.clone(),
            username: request.username,
            account_no: owner.account_no.clone(),
            blessing,
            amount: total.value(),
            amount_one,
            quantity,
            expired_at: Utc::now() + Duration::hours(ENVELOPE_TTL_HOURS),
            status: EnvelopeStatus::Created,
            order_type: OrderType::Sending,
            pay_status: PayStatus::Paid,
            origin_envelope_no: None,
        };

        let mut tx = self.pool.begin().await?;

        let envelope = repository::insert_envelope(&mut tx, &new_envelope).await?;

        let command = TransferCommand::new(
            envelope.envelope_no.clone(),
            owner.clone(),
            self.system.clone(),
            TransferAmount::Debit(total),
            ChangeType::EnvelopeOutgoing,
        )
        .with_description(format!("Sent {} envelope", envelope.envelope_type.label()));

        self.transfer
            .transfer_in(&mut tx, &command)
            .await
            .into_result(&owner.account_no)?;

        tx.commit().await?;

        tracing::info!(
            envelope_no = %envelope.envelope_no,
            user_id = %envelope.user_id,
            envelope_type = envelope.envelope_type.label(),
            amount = %envelope.amount,
            quantity = envelope.quantity,
            "Envelope sent"
        );

        let link = self.links.link_for(&envelope.envelope_no);
        Ok(EnvelopeActivity { envelope, link })
    }

    /// Claim one share of a pool.
    ///
    /// A zero-row stock write means the snapshot went stale: the pool is
    /// reloaded and the share recomputed. `Depleted` is reported only once a
    /// fresh snapshot has no stock left.
    pub async fn receive(
        &self,
        envelope_no: &str,
        receiver: Receiver,
    ) -> Result<EnvelopeClaim, DomainError> {
        let account = self.envelope_account(&receiver.user_id).await?;
        let receiver = TradeParticipant::new(account.account_no, receiver.user_id, receiver.username);

        let mut tx = self.pool.begin().await?;
        let mut pinned_quantity: Option<i32> = None;

        loop {
            let envelope = repository::find_by_no(&mut tx, envelope_no)
                .await?
                .ok_or_else(|| DomainError::EnvelopeNotFound(envelope_no.to_string()))?;

            if !envelope.has_stock() {
                tracing::debug!(envelope_no, user_id = %receiver.user_id, "Envelope depleted");
                return Err(DomainError::depleted(envelope_no));
            }

            // An unchanged quantity after a failed write means the status or
            // the deadline rejected it, not a competing claim
            if envelope.status.is_terminal()
                || envelope.is_expired_at(Utc::now())
                || pinned_quantity == Some(envelope.remain_quantity)
            {
                return Err(DomainError::EnvelopeExpired(envelope_no.to_string()));
            }

            let share = self.next_share(&envelope)?;

            let rows = repository::decrement_stock(
                &mut tx,
                envelope_no,
                share.value(),
                envelope.remain_quantity,
            )
            .await?;

            if rows == 0 {
                tracing::debug!(
                    envelope_no,
                    user_id = %receiver.user_id,
                    remain_quantity = envelope.remain_quantity,
                    "Lost claim race, re-reading pool"
                );
                pinned_quantity = Some(envelope.remain_quantity);
                continue;
            }

            let claim = self
                .record_claim(&mut tx, &envelope, &receiver, share)
                .await?;

            tx.commit().await?;

            tracing::info!(
                envelope_no,
                claim_no = %claim.claim_no,
                user_id = %claim.recv_user_id,
                amount = %claim.amount,
                remain_amount = %claim.remain_amount,
                "Envelope share claimed"
            );

            return Ok(claim);
        }
    }

    fn next_share(&self, envelope: &Envelope) -> Result<Amount, DomainError> {
        let stock = Stock {
            remain_units: split::to_minor_units(envelope.remain_amount)?,
            remain_quantity: i64::from(envelope.remain_quantity),
        };
        let per_share_units = split::to_minor_units(envelope.amount_one)?;

        let units = {
            let mut rng = rand::thread_rng();
            split::next_share(envelope.envelope_type, per_share_units, stock, &mut rng)
        }
        .ok_or_else(|| DomainError::depleted(&envelope.envelope_no))?;

        Amount::from_minor_units(units).map_err(|e| {
            DomainError::invariant(format!(
                "share of envelope {} is not a valid amount: {}",
                envelope.envelope_no, e
            ))
        })
    }

    /// Insert the claim row and credit the receiver inside the claim's transaction
    async fn record_claim(
        &self,
        conn: &mut PgConnection,
        envelope: &Envelope,
        receiver: &TradeParticipant,
        share: Amount,
    ) -> Result<EnvelopeClaim, DomainError> {
        let claim = repository::insert_claim(
            &mut *conn,
            &NewClaim {
                claim_no: new_business_no(),
                envelope_no: envelope.envelope_no.clone(),
                recv_user_id: receiver.user_id.clone(),
                recv_username: receiver.username.clone(),
                account_no: receiver.account_no.clone(),
                amount: share.value(),
                remain_amount: envelope.remain_amount - share.value(),
                pay_status: PayStatus::Paid,
                description: format!(
                    "{}'s {} envelope",
                    envelope.username,
                    envelope.envelope_type.label()
                ),
            },
        )
        .await?;

        let command = TransferCommand::new(
            claim.claim_no.clone(),
            receiver.clone(),
            self.system.clone(),
            TransferAmount::Credit(share),
            ChangeType::EnvelopeIncoming,
        )
        .with_description(claim.description.clone());

        self.transfer
            .transfer_in(&mut *conn, &command)
            .await
            .into_result(&receiver.account_no)?;

        Ok(claim)
    }

    /// Return the unclaimed stock of an expired pool to its owner.
    ///
    /// One transaction: mark the pool expired, derive the refund pool and
    /// credit the owner. Anything but a successful credit rolls it all back.
    pub async fn refund(&self, envelope: &Envelope) -> Result<RefundOutcome, DomainError> {
        let mut tx = self.pool.begin().await?;

        let rows =
            repository::mark_refunded(&mut tx, &envelope.envelope_no, envelope.remain_quantity)
                .await?;
        if rows == 0 {
            tracing::debug!(envelope_no = %envelope.envelope_no, "Envelope already reclaimed");
            return Ok(RefundOutcome::Skipped);
        }

        let refund_pool = repository::insert_envelope(
            &mut tx,
            &NewEnvelope::refund_of(envelope, Duration::hours(ENVELOPE_TTL_HOURS)),
        )
        .await?;

        let amount = Amount::new(envelope.remain_amount).map_err(|e| {
            DomainError::invariant(format!(
                "remaining stock of envelope {} is not refundable: {}",
                envelope.envelope_no, e
            ))
        })?;

        let owner = envelope.owner();
        let command = TransferCommand::new(
            refund_pool.envelope_no.clone(),
            owner.clone(),
            self.system.clone(),
            TransferAmount::Credit(amount),
            ChangeType::EnvelopeExpiredRefund,
        )
        .with_description(format!("Refund of expired envelope {}", envelope.envelope_no));

        self.transfer
            .transfer_in(&mut tx, &command)
            .await
            .into_result(&owner.account_no)?;

        tx.commit().await?;

        tracing::info!(
            envelope_no = %envelope.envelope_no,
            refund_envelope_no = %refund_pool.envelope_no,
            amount = %amount,
            "Expired envelope refunded"
        );

        Ok(RefundOutcome::Refunded(refund_pool))
    }

    pub async fn get(&self, envelope_no: &str) -> Result<Envelope, DomainError> {
        let mut conn = self.pool.acquire().await?;
        repository::find_by_no(&mut conn, envelope_no)
            .await?
            .ok_or_else(|| DomainError::EnvelopeNotFound(envelope_no.to_string()))
    }

    /// Claims of a pool in claim order, luckiest flagged once exhausted
    pub async fn claims(&self, envelope_no: &str) -> Result<Vec<ClaimView>, DomainError> {
        let mut conn = self.pool.acquire().await?;
        let envelope = repository::find_by_no(&mut conn, envelope_no)
            .await?
            .ok_or_else(|| DomainError::EnvelopeNotFound(envelope_no.to_string()))?;
        let claims = repository::claims_for(&mut conn, envelope_no).await?;

        Ok(flag_luckiest(&envelope, claims))
    }

    pub async fn list_sent(&self, user_id: &str, page: Page) -> Result<Vec<Envelope>, DomainError> {
        let mut conn = self.pool.acquire().await?;
        Ok(repository::list_by_owner(&mut conn, user_id, page.limit(), page.offset()).await?)
    }

    pub async fn list_received(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<Vec<EnvelopeClaim>, DomainError> {
        let mut conn = self.pool.acquire().await?;
        Ok(repository::claims_by_receiver(&mut conn, user_id, page.limit(), page.offset()).await?)
    }

    pub async fn list_receivable(&self, page: Page) -> Result<Vec<Envelope>, DomainError> {
        let mut conn = self.pool.acquire().await?;
        Ok(repository::list_receivable(&mut conn, page.limit(), page.offset()).await?)
    }
}
