//! Transfers between accounts.
//!
//! Moves money from checking to savings, edits the amount, reconciles the
//! savings side and finally deletes the savings account, printing balances
//! after every step.

use chrono::NaiveDate;
use money_ledger::prelude::*;
use rust_decimal_macros::dec;

fn print_balances(ledger: &Ledger, title: &str) {
    println!("━━━ {} ━━━", title);
    for account in ledger.accounts().iter() {
        println!("  {:<10} {:>10}", account.display_name(), account.balance());
    }
    println!();
}

fn main() -> Result<()> {
    env_logger::init();

    let mut ledger = Ledger::new();
    let checking = ledger
        .add_account(Account::new("Checking", AccountType::Checking).with_opening_balance(dec!(1000)))?;
    let savings = ledger.add_account(Account::new("Savings", AccountType::Savings))?;
    print_balances(&ledger, "Opening balances");

    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default();
    let out = ledger.add_transaction(Transaction::new(checking, date, dec!(-200)).with_memo("rainy day"))?;
    let into = ledger.transfer(out, savings)?;
    print_balances(&ledger, "After transferring 200");

    ledger.set_amount(out, dec!(-250))?;
    println!("mirror amount follows the edit: {}", ledger.transaction(into)?.amount());
    print_balances(&ledger, "After raising the transfer to 250");

    ledger.set_status(into, TransactionStatus::Reconciled)?;
    match ledger.remove_transfer(out) {
        Err(e) => println!("removing a reconciled transfer is refused: {}\n", e),
        Ok(()) => println!("unexpected: reconciled transfer removed\n"),
    }

    ledger.set_status(into, TransactionStatus::Cleared)?;
    ledger.remove_account(savings)?;
    let orphan = ledger.transaction(out)?;
    let category = orphan
        .category()
        .and_then(|c| ledger.category(c).ok())
        .map(|c| c.full_name().to_string())
        .unwrap_or_default();
    println!("checking side now filed under '{}'", category);
    print_balances(&ledger, "After deleting Savings");

    let dangling = ledger.check_transfers();
    println!("dangling transfers: {}", dangling.len());
    Ok(())
}
