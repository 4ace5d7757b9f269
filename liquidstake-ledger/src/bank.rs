use crate::InMemoryLedger;
use liquidstake_types::ledger::{Address, BankLedger, LedgerError};
use liquidstake_types::{Amount, MathError};

impl InMemoryLedger {
    pub(crate) fn mint_to(&mut self, to: &Address, denom: &str, amount: Amount) -> Result<(), LedgerError> {
        let supply = self.supply.entry(denom.to_string()).or_default();
        *supply = supply
            .checked_add(amount)
            .ok_or(LedgerError::Math(MathError::AdditionOverflow))?;
        *self
            .balances
            .entry(*to)
            .or_default()
            .entry(denom.to_string())
            .or_default() += amount;
        Ok(())
    }

    pub(crate) fn burn_from(&mut self, from: &Address, denom: &str, amount: Amount) -> Result<(), LedgerError> {
        self.debit(from, denom, amount)?;
        let supply = self.supply.entry(denom.to_string()).or_default();
        *supply = supply.saturating_sub(amount);
        Ok(())
    }

    pub(crate) fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        denom: &str,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.debit(from, denom, amount)?;
        *self
            .balances
            .entry(*to)
            .or_default()
            .entry(denom.to_string())
            .or_default() += amount;
        Ok(())
    }

    fn debit(&mut self, from: &Address, denom: &str, amount: Amount) -> Result<(), LedgerError> {
        let have = self.balance(from, denom);
        if have < amount {
            return Err(LedgerError::InsufficientFunds { have, need: amount });
        }
        if let Some(balance) = self.balances.get_mut(from).and_then(|b| b.get_mut(denom)) {
            *balance -= amount;
        }
        Ok(())
    }
}

impl BankLedger for InMemoryLedger {
    fn balance(&self, account: &Address, denom: &str) -> Amount {
        self.balances
            .get(account)
            .and_then(|b| b.get(denom))
            .copied()
            .unwrap_or(0)
    }

    fn supply(&self, denom: &str) -> Amount {
        self.supply.get(denom).copied().unwrap_or(0)
    }

    fn send(&mut self, from: &Address, to: &Address, denom: &str, amount: Amount) -> Result<(), LedgerError> {
        self.transfer(from, to, denom, amount)
    }

    fn mint(&mut self, to: &Address, denom: &str, amount: Amount) -> Result<(), LedgerError> {
        self.mint_to(to, denom, amount)
    }

    fn burn(&mut self, from: &Address, denom: &str, amount: Amount) -> Result<(), LedgerError> {
        self.burn_from(from, denom, amount)
    }
}
