use chrono::NaiveDate;
use money_ledger::prelude::*;
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Op {
    Add { account: usize, cents: i64, category: Option<usize> },
    SetAmount { pick: usize, cents: i64 },
    SetCategory { pick: usize, category: Option<usize> },
    AddSplit { pick: usize, cents: i64, category: Option<usize> },
    RemoveSplit { pick: usize },
    SetSplitAmount { pick: usize, cents: i64 },
    TransferSplit { pick: usize, account: usize },
    Transfer { pick: usize, account: usize },
    RemoveTransfer { pick: usize },
    Void { pick: usize },
    Remove { pick: usize },
    MoveCategory { category: usize, parent: Option<usize> },
    RemoveAccount { account: usize },
}

const ACCOUNTS: usize = 3;
const CATEGORIES: [&str; 4] = ["Food:Groceries", "Food:Dining", "Home:Rent", "Fun"];

/// Non-zero amounts between -500.00 and 500.00.
fn arb_cents() -> impl Strategy<Value = i64> {
    (-50_000i64..50_000).prop_filter("non-zero", |c| *c != 0)
}

fn arb_category() -> impl Strategy<Value = Option<usize>> {
    prop::option::of(0..CATEGORIES.len())
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..ACCOUNTS, arb_cents(), arb_category())
            .prop_map(|(account, cents, category)| Op::Add { account, cents, category }),
        1 => (any::<usize>(), arb_cents()).prop_map(|(pick, cents)| Op::SetAmount { pick, cents }),
        1 => (any::<usize>(), arb_category()).prop_map(|(pick, category)| Op::SetCategory { pick, category }),
        2 => (any::<usize>(), arb_cents(), arb_category())
            .prop_map(|(pick, cents, category)| Op::AddSplit { pick, cents, category }),
        1 => any::<usize>().prop_map(|pick| Op::RemoveSplit { pick }),
        1 => (any::<usize>(), arb_cents()).prop_map(|(pick, cents)| Op::SetSplitAmount { pick, cents }),
        2 => (any::<usize>(), 0..ACCOUNTS).prop_map(|(pick, account)| Op::TransferSplit { pick, account }),
        2 => (any::<usize>(), 0..ACCOUNTS).prop_map(|(pick, account)| Op::Transfer { pick, account }),
        1 => any::<usize>().prop_map(|pick| Op::RemoveTransfer { pick }),
        1 => any::<usize>().prop_map(|pick| Op::Void { pick }),
        1 => any::<usize>().prop_map(|pick| Op::Remove { pick }),
        1 => (0..CATEGORIES.len(), arb_category())
            .prop_map(|(category, parent)| Op::MoveCategory { category, parent }),
        1 => (0..ACCOUNTS).prop_map(|account| Op::RemoveAccount { account }),
    ]
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 1..40)
}

/// Apply `ops` to a fresh ledger. Rejected operations are part of the
/// exercise and are ignored.
fn run(ops: &[Op]) -> Ledger {
    let mut ledger = Ledger::new();
    let accounts: Vec<AccountId> = (0..ACCOUNTS)
        .map(|i| {
            ledger
                .add_account(Account::new(format!("Account {}", i), AccountType::Checking))
                .unwrap()
        })
        .collect();
    let categories: Vec<CategoryId> = CATEGORIES
        .iter()
        .map(|path| ledger.get_or_create_category(path, CategoryType::Expense).unwrap())
        .collect();
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    for op in ops {
        let live: Vec<TransactionId> = ledger.transactions().iter().map(|t| t.id()).collect();
        let pick = |i: usize| (!live.is_empty()).then(|| live[i % live.len()]);
        let _ = match op.clone() {
            Op::Add { account, cents, category } => {
                let mut t = Transaction::new(accounts[account], date, Decimal::new(cents, 2));
                if let Some(c) = category {
                    t = t.with_category(categories[c]);
                }
                ledger.add_transaction(t).map(|_| ())
            }
            Op::SetAmount { pick: i, cents } => match pick(i) {
                Some(t) => ledger.set_amount(t, Decimal::new(cents, 2)),
                None => Ok(()),
            },
            Op::SetCategory { pick: i, category } => match pick(i) {
                Some(t) => ledger.set_category(t, category.map(|c| categories[c])),
                None => Ok(()),
            },
            Op::AddSplit { pick: i, cents, category } => match pick(i) {
                Some(t) => {
                    let mut split = Split::new(Decimal::new(cents, 2));
                    if let Some(c) = category {
                        split = split.with_category(categories[c]);
                    }
                    ledger.add_split(t, split).map(|_| ())
                }
                None => Ok(()),
            },
            Op::RemoveSplit { pick: i } => match pick(i) {
                Some(t) => {
                    let first = ledger.transaction(t).unwrap().splits().ids().first().copied();
                    match first {
                        Some(s) => ledger.remove_split(t, s),
                        None => Ok(()),
                    }
                }
                None => Ok(()),
            },
            Op::SetSplitAmount { pick: i, cents } => match pick(i) {
                Some(t) => {
                    let first = ledger.transaction(t).unwrap().splits().ids().first().copied();
                    match first {
                        Some(s) => ledger.set_split_amount(t, s, Decimal::new(cents, 2)),
                        None => Ok(()),
                    }
                }
                None => Ok(()),
            },
            Op::TransferSplit { pick: i, account } => match pick(i) {
                Some(t) => {
                    let last = ledger.transaction(t).unwrap().splits().ids().last().copied();
                    match last {
                        Some(s) => ledger.transfer_split(t, s, accounts[account]).map(|_| ()),
                        None => Ok(()),
                    }
                }
                None => Ok(()),
            },
            Op::Transfer { pick: i, account } => match pick(i) {
                Some(t) => ledger.transfer(t, accounts[account]).map(|_| ()),
                None => Ok(()),
            },
            Op::RemoveTransfer { pick: i } => match pick(i) {
                Some(t) => ledger.remove_transfer(t),
                None => Ok(()),
            },
            Op::Void { pick: i } => match pick(i) {
                Some(t) => ledger.set_status(t, TransactionStatus::Void),
                None => Ok(()),
            },
            Op::Remove { pick: i } => match pick(i) {
                Some(t) => ledger.remove_transaction(t),
                None => Ok(()),
            },
            Op::MoveCategory { category, parent } => {
                ledger.move_category(categories[category], parent.map(|p| categories[p]))
            }
            Op::RemoveAccount { account } => ledger.remove_account(accounts[account]),
        };
    }
    ledger
}

proptest! {
    // Live splits plus the unassigned remainder always cover the amount.
    #[test]
    fn split_remainder_closes_the_sum(ops in arb_ops()) {
        let ledger = run(&ops);
        for t in ledger.transactions().iter().filter(|t| t.has_splits()) {
            prop_assert_eq!(
                t.splits().total() + t.splits().unassigned(),
                t.split_target(),
                "splits of {} do not add up",
                t.id()
            );
        }
    }

    // Every transfer link has a live partner pointing straight back.
    #[test]
    fn transfers_stay_reciprocal(ops in arb_ops()) {
        let mut ledger = run(&ops);
        let dangling = ledger.check_transfers();
        prop_assert!(dangling.is_empty(), "dangling transfers: {:?}", dangling);
        for t in ledger.transactions().iter() {
            if let Some(link) = t.transfer().filter(|l| l.split.is_none()) {
                let mirror = ledger.transaction(link.transaction).unwrap();
                prop_assert_eq!(mirror.amount(), -t.amount());
            }
            for s in t.splits().iter() {
                if let Some(link) = s.transfer() {
                    let mirror = ledger.transaction(link.transaction).unwrap();
                    prop_assert_eq!(mirror.amount(), -s.amount());
                }
            }
        }
    }

    // Deleting an account unlinks every far side and files it under a
    // deleted-account category.
    #[test]
    fn removed_account_orphans_far_sides(ops in arb_ops(), victim in 0..ACCOUNTS) {
        let mut ledger = run(&ops);
        let Some(account) = ledger.accounts().iter().map(|a| a.id()).nth(victim) else {
            return Ok(());
        };
        let mut whole = Vec::new();
        let mut parts = Vec::new();
        for t in ledger.transactions().iter().filter(|t| t.account() != account) {
            if t.transfer().is_some_and(|l| l.account == account) {
                whole.push(t.id());
            }
            for s in t.splits().iter() {
                if s.transfer().is_some_and(|l| l.account == account) {
                    parts.push((t.id(), s.id()));
                }
            }
        }

        ledger.remove_account(account).unwrap();
        let orphan_categories = [
            ledger.categories().find_id("Xfer to Deleted Account"),
            ledger.categories().find_id("Xfer from Deleted Account"),
        ];
        for id in whole {
            let t = ledger.transaction(id).unwrap();
            prop_assert!(t.transfer().is_none());
            prop_assert!(orphan_categories.contains(&t.category()));
        }
        for (id, split) in parts {
            let s = ledger.transaction(id).unwrap().splits().get(split).unwrap();
            prop_assert!(s.transfer().is_none());
            prop_assert!(orphan_categories.contains(&s.category()));
        }
        prop_assert!(ledger.check_transfers().is_empty());
    }

    // Balances maintained by delta match a from-scratch recompute.
    #[test]
    fn category_balances_match_recompute(ops in arb_ops()) {
        let mut ledger = run(&ops);
        let incremental: Vec<(CategoryId, Decimal)> =
            ledger.categories().iter().map(|c| (c.id(), c.balance())).collect();
        ledger.recompute_category_balances();
        let recomputed: Vec<(CategoryId, Decimal)> =
            ledger.categories().iter().map(|c| (c.id(), c.balance())).collect();
        prop_assert_eq!(incremental, recomputed);
    }

    // Account balances equal opening balance plus every non-void amount.
    #[test]
    fn account_balance_is_sum_of_entries(ops in arb_ops()) {
        let ledger = run(&ops);
        for account in ledger.accounts().iter() {
            let expected: Decimal = account.opening_balance()
                + ledger
                    .transactions()
                    .for_account(account.id())
                    .iter()
                    .filter(|t| !t.is_void())
                    .map(|t| t.amount())
                    .sum::<Decimal>();
            prop_assert_eq!(account.balance(), expected);
        }
    }

    // Sweeping tombstones twice finds nothing the second time.
    #[test]
    fn remove_deleted_is_idempotent(ops in arb_ops(), every in 1usize..4) {
        let mut ledger = run(&ops);
        ledger.accept_changes();
        let ids: Vec<TransactionId> = ledger.transactions().iter().map(|t| t.id()).collect();
        for id in ids.into_iter().step_by(every) {
            let _ = ledger.remove_transaction(id);
        }
        ledger.remove_deleted();
        prop_assert!(ledger.transactions().iter_all().all(|t| !t.is_deleted()));
        prop_assert_eq!(ledger.remove_deleted(), 0);
    }
}
