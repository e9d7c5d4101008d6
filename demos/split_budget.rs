//! Split transactions and the category hierarchy.
//!
//! Splits one grocery-store receipt across several categories and shows how
//! each split's amount rolls up into its parent categories.

use chrono::NaiveDate;
use money_ledger::prelude::*;
use rust_decimal_macros::dec;

fn print_tree(ledger: &Ledger, id: CategoryId, depth: usize) -> Result<()> {
    let category = ledger.category(id)?;
    println!(
        "  {:indent$}{:<20} {:>10}",
        "",
        category.label(),
        category.balance(),
        indent = depth * 2
    );
    for child in category.children().clone() {
        print_tree(ledger, child, depth + 1)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut ledger = Ledger::new();
    let card = ledger.add_account(Account::new("Visa", AccountType::Credit))?;
    let groceries = ledger.get_or_create_category("Food:Groceries", CategoryType::Expense)?;
    let snacks = ledger.get_or_create_category("Food:Snacks", CategoryType::Expense)?;
    let cleaning = ledger.get_or_create_category("Home:Cleaning", CategoryType::Expense)?;
    let store = ledger.get_or_create_payee("MegaMart")?;
    ledger.add_alias(Alias::regex("^MEGAMART #[0-9]+", store)?)?;

    let payee = ledger.match_payee("MEGAMART #0193");
    let date = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap_or_default();
    let mut receipt = Transaction::new(card, date, dec!(-84.50));
    if let Some(payee) = payee {
        receipt = receipt.with_payee(payee);
    }
    let receipt = ledger.add_transaction(receipt)?;

    ledger.add_split(receipt, Split::new(dec!(-52.25)).with_category(groceries))?;
    ledger.add_split(receipt, Split::new(dec!(-12.00)).with_category(snacks))?;
    println!(
        "unassigned after two splits: {}",
        ledger.transaction(receipt)?.splits().unassigned()
    );
    ledger.add_split(receipt, Split::new(dec!(-20.25)).with_category(cleaning))?;
    println!(
        "unassigned after three splits: {}\n",
        ledger.transaction(receipt)?.splits().unassigned()
    );

    println!("━━━ Category balances ━━━");
    for root in ledger.categories().roots() {
        print_tree(&ledger, root, 0)?;
    }

    println!("\n━━━ Everything under Food ━━━");
    if let Some(food) = ledger.categories().find_id("Food") {
        for row in ledger.get_transactions_by_category(food, |_| true) {
            println!("  {} {:>10} {:?}", row.date, row.amount, row.view);
        }
    }
    Ok(())
}
