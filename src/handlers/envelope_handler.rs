//! Envelope Handler
//!
//! Maps validated commands onto the distributor.

use crate::domain::validation::{self, Validate};
use crate::envelope::{
    ClaimView, Envelope, EnvelopeActivity, EnvelopeClaim, EnvelopeDistributor, Receiver, SendOut,
};
use crate::error::AppError;

use super::{PageQuery, ReceiveEnvelopeCommand, SendEnvelopeCommand};

pub struct EnvelopeHandler {
    distributor: EnvelopeDistributor,
}

impl EnvelopeHandler {
    pub fn new(distributor: EnvelopeDistributor) -> Self {
        Self { distributor }
    }

    pub async fn send(&self, command: SendEnvelopeCommand) -> Result<EnvelopeActivity, AppError> {
        command.validate()?;
        let amount = validation::amount("amount", &command.amount)?;
        let quantity = u32::try_from(command.quantity)
            .map_err(|_| AppError::InvalidRequest("quantity out of range".to_string()))?;

        let request = SendOut {
            user_id: command.user_id,
            username: command.username,
            envelope_type: command.envelope_type,
            amount,
            quantity,
            blessing: command.blessing,
        };

        Ok(self.distributor.send_out(request).await?)
    }

    pub async fn receive(
        &self,
        envelope_no: &str,
        command: ReceiveEnvelopeCommand,
    ) -> Result<EnvelopeClaim, AppError> {
        command.validate()?;
        validation::required("envelope_no", envelope_no)?;

        let receiver = Receiver {
            user_id: command.user_id,
            username: command.username,
        };

        Ok(self.distributor.receive(envelope_no, receiver).await?)
    }

    pub async fn get(&self, envelope_no: &str) -> Result<Envelope, AppError> {
        Ok(self.distributor.get(envelope_no).await?)
    }

    pub async fn claims(&self, envelope_no: &str) -> Result<Vec<ClaimView>, AppError> {
        Ok(self.distributor.claims(envelope_no).await?)
    }

    pub async fn list_sent(&self, user_id: &str, query: PageQuery) -> Result<Vec<Envelope>, AppError> {
        query.validate()?;
        Ok(self.distributor.list_sent(user_id, query.into()).await?)
    }

    pub async fn list_received(
        &self,
        user_id: &str,
        query: PageQuery,
    ) -> Result<Vec<EnvelopeClaim>, AppError> {
        query.validate()?;
        Ok(self.distributor.list_received(user_id, query.into()).await?)
    }

    pub async fn list_receivable(&self, query: PageQuery) -> Result<Vec<Envelope>, AppError> {
        query.validate()?;
        Ok(self.distributor.list_receivable(query.into()).await?)
    }
}
