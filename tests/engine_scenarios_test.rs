use tranchewell::domain::{PositionStatus, ProtocolParams};
use tranchewell::engine::YieldCurve;
use tranchewell::{BucketIndex, BucketRange, Decimal, Engine, EngineError, Owner, Tier};

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn range(start: i64, end: i64) -> BucketRange {
    BucketRange::new(start, end).unwrap()
}

fn assert_close(actual: Decimal, expected: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= d("0.000000001"),
        "expected {} got {} (diff {})",
        expected,
        actual,
        diff
    );
}

fn fee_free() -> ProtocolParams {
    ProtocolParams {
        performance_fee_rate: Decimal::zero(),
        ..ProtocolParams::default()
    }
}

fn bucket_sum(engine: &Engine) -> Decimal {
    engine
        .buckets()
        .buckets()
        .iter()
        .map(|b| b.total_liquidity)
        .sum()
}

#[test]
fn test_lone_hero_takes_net_yield_and_bonus_is_held() {
    let mut engine = Engine::default();
    let id = engine
        .stake(Owner::new("alice"), d("10000"), Tier::Hero.range())
        .unwrap();

    let report = engine.apply_yield(d("1000000")).unwrap();

    let fee = report.fee.unwrap();
    assert_eq!(fee.total, d("100000"));
    assert_eq!(report.net_yield, Some(d("900000")));
    assert_eq!(report.tier(Tier::Hero).unwrap().amount, d("900000"));
    assert_eq!(report.shortfall, Decimal::zero());
    // Safe, Conservative and Balanced are underweight but empty.
    assert_eq!(report.bonus_held, d("40000"));
    assert_eq!(report.tier(Tier::Hero).unwrap().bonus, Decimal::zero());

    let view = engine.snapshot(id).unwrap();
    assert_eq!(view.earned_amount, d("900000"));
    assert_eq!(view.current_value, d("910000"));

    assert_eq!(engine.treasury().held_bonus, d("40000"));
    assert_eq!(engine.treasury().buyback_total, d("20000"));
    assert_eq!(engine.treasury().protocol_revenue_total, d("20000"));
    assert_eq!(engine.params().reserve_amount, d("20000"));
    assert_eq!(engine.buckets().total_liquidity(), d("910000"));
}

#[test]
fn test_held_bonus_is_paid_once_an_underweight_tier_is_funded() {
    let mut engine = Engine::default();
    engine
        .stake(Owner::new("alice"), d("10000"), Tier::Hero.range())
        .unwrap();
    engine.apply_yield(d("1000000")).unwrap();
    assert_eq!(engine.treasury().held_bonus, d("40000"));

    let safe = engine
        .stake(Owner::new("bob"), d("1000"), Tier::Safe.range())
        .unwrap();
    let report = engine.apply_yield(d("100")).unwrap();

    // New pool is 4 plus the 40000 carried over; Safe is the only funded underweight tier.
    let safe_line = report.tier(Tier::Safe).unwrap();
    assert!(safe_line.bonus.is_positive());
    let paid: Decimal = report.tiers.iter().map(|t| t.bonus).sum();
    assert_eq!(paid + report.bonus_held, d("40004"));

    let view = engine.snapshot(safe).unwrap();
    assert_close(view.earned_amount, safe_line.amount + safe_line.bonus);
}

#[test]
fn test_insolvent_loss_is_rejected_without_touching_state() {
    let mut engine = Engine::default();
    let id = engine
        .stake(Owner::new("carol"), d("5000"), Tier::Safe.range())
        .unwrap();

    let err = engine.apply_loss(d("2000000")).unwrap_err();
    match err {
        EngineError::InsolvencyDetected {
            total_loss,
            absorbable,
            uncovered,
        } => {
            assert_eq!(total_loss, d("2000000"));
            assert_eq!(absorbable, d("5000"));
            assert_eq!(uncovered, d("1995000"));
        }
        other => panic!("expected insolvency, got {:?}", other),
    }

    assert_eq!(engine.buckets().tier_liquidity(Tier::Safe), d("5000"));
    let view = engine.snapshot(id).unwrap();
    assert_eq!(view.earned_amount, Decimal::zero());
    assert_eq!(view.current_value, d("5000"));
}

#[test]
fn test_overlapping_positions_split_by_footprint() {
    let mut engine = Engine::new(fee_free());
    let a = engine
        .stake(Owner::new("a"), d("1000"), range(0, 9))
        .unwrap();
    let b = engine
        .stake(Owner::new("b"), d("3000"), range(0, 9))
        .unwrap();

    let report = engine.apply_yield(d("400")).unwrap();
    assert_eq!(report.tier(Tier::Safe).unwrap().amount, d("400"));
    assert_eq!(report.positions_affected, 2);

    assert_close(engine.snapshot(a).unwrap().earned_amount, d("100"));
    assert_close(engine.snapshot(b).unwrap().earned_amount, d("300"));
    assert_eq!(engine.buckets().total_liquidity(), d("4400"));
}

#[test]
fn test_distribution_passes_conserve_amounts() {
    let mut engine = Engine::default();
    engine
        .stake(Owner::new("a"), d("1234.56"), range(0, 14))
        .unwrap();
    engine
        .stake(Owner::new("b"), d("777.77"), range(25, 44))
        .unwrap();
    engine
        .stake(Owner::new("c"), d("3333.33"), range(55, 99))
        .unwrap();

    for gross in ["0.01", "7", "123.456789", "99999.99"] {
        let report = engine.apply_yield(d(gross)).unwrap();
        let fee = report.fee.unwrap();
        assert_eq!(
            fee.bonus + fee.buyback + fee.protocol_revenue + fee.insurance,
            fee.total
        );
        assert_close(report.tier_total(), report.net_yield.unwrap());
        assert_eq!(report.net_yield.unwrap() + fee.total, d(gross));
    }

    for loss in ["0.03", "50", "333.333333"] {
        let report = engine.apply_loss(d(loss)).unwrap();
        assert_close(report.tier_total() + report.reserve_used, d(loss));
    }

    assert_close(bucket_sum(&engine), engine.buckets().total_liquidity());
}

#[test]
fn test_shortfall_leaves_hero_at_zero() {
    let mut engine = Engine::new(fee_free());
    engine
        .stake(Owner::new("a"), d("1000"), Tier::Safe.range())
        .unwrap();
    let hero = engine
        .stake(Owner::new("b"), d("1000"), Tier::Hero.range())
        .unwrap();

    // Safe owes roughly 54 on 1000 at the minimum rate.
    let report = engine.apply_yield(d("10")).unwrap();
    assert_eq!(report.tier(Tier::Safe).unwrap().amount, d("10"));
    assert_eq!(report.tier(Tier::Hero).unwrap().amount, Decimal::zero());
    assert!(report.shortfall.is_positive());
    assert_eq!(engine.snapshot(hero).unwrap().earned_amount, Decimal::zero());
}

#[test]
fn test_shortfall_can_be_rejected() {
    let mut params = fee_free();
    params.reject_yield_shortfall = true;
    let mut engine = Engine::new(params);
    let id = engine
        .stake(Owner::new("a"), d("1000"), Tier::Safe.range())
        .unwrap();

    let err = engine.apply_yield(d("10")).unwrap_err();
    assert!(matches!(err, EngineError::YieldShortfall { .. }));
    assert_eq!(engine.snapshot(id).unwrap().earned_amount, Decimal::zero());
    assert_eq!(engine.buckets().total_liquidity(), d("1000"));
}

#[test]
fn test_yield_without_liquidity_is_rejected() {
    let mut engine = Engine::default();
    assert_eq!(
        engine.apply_yield(d("100")).unwrap_err(),
        EngineError::NoLiquidity
    );
    assert_eq!(engine.treasury().protocol_revenue_total, Decimal::zero());
}

#[test]
fn test_repeated_losses_floor_value_at_zero() {
    let mut engine = Engine::default();
    let id = engine
        .stake(Owner::new("a"), d("100"), Tier::Hero.range())
        .unwrap();
    engine
        .stake(Owner::new("b"), d("100"), Tier::Safe.range())
        .unwrap();

    engine.apply_loss(d("60")).unwrap();
    engine.apply_loss(d("60")).unwrap();
    let hero = engine.snapshot(id).unwrap();
    assert_eq!(hero.current_value, Decimal::zero());
    assert_eq!(engine.buckets().tier_liquidity(Tier::Hero), Decimal::zero());
    assert_eq!(engine.buckets().tier_liquidity(Tier::Safe), d("80"));

    for b in engine.buckets().buckets() {
        assert!(!b.total_liquidity.is_negative());
    }
}

#[test]
fn test_stake_close_sequences_keep_liquidity_non_negative() {
    let mut engine = Engine::default();
    let mut ids = Vec::new();
    for (i, (start, end)) in [(0, 5), (3, 40), (20, 70), (65, 99), (0, 99)].iter().enumerate() {
        let amount = Decimal::from((i as i64 + 1) * 111);
        ids.push(
            engine
                .stake(Owner::new("a"), amount, range(*start, *end))
                .unwrap(),
        );
    }
    engine.apply_yield(d("321.5")).unwrap();
    engine.apply_loss(d("200")).unwrap();

    for id in ids.iter().rev() {
        engine.close(*id).unwrap();
        for b in engine.buckets().buckets() {
            assert!(!b.total_liquidity.is_negative());
        }
    }
    assert_close(engine.buckets().total_liquidity(), Decimal::zero());
    assert_eq!(engine.protocol_state().active_positions, 0);
}

#[test]
fn test_close_pays_current_value_once() {
    let mut engine = Engine::new(fee_free());
    let id = engine
        .stake(Owner::new("a"), d("1000"), Tier::Safe.range())
        .unwrap();
    engine.apply_yield(d("50")).unwrap();

    let payout = engine.close(id).unwrap();
    assert_eq!(payout, d("1050"));
    let view = engine.snapshot(id).unwrap();
    assert_eq!(view.status, PositionStatus::Closed);
    assert_eq!(view.payout, Some(d("1050")));
    assert_eq!(engine.close(id), Err(EngineError::AlreadyClosed(id)));
}

#[test]
fn test_bonus_is_conserved() {
    let mut engine = Engine::default();
    engine
        .stake(Owner::new("a"), d("9000"), Tier::Hero.range())
        .unwrap();
    engine
        .stake(Owner::new("b"), d("500"), Tier::Safe.range())
        .unwrap();
    engine
        .stake(Owner::new("c"), d("500"), Tier::Balanced.range())
        .unwrap();

    let report = engine.apply_yield(d("5000")).unwrap();
    let pool = report.fee.unwrap().bonus;
    let paid: Decimal = report.tiers.iter().map(|t| t.bonus).sum();
    assert_eq!(paid + report.bonus_held, pool);
    // Hero is overweight and gets none.
    assert_eq!(report.tier(Tier::Hero).unwrap().bonus, Decimal::zero());
}

#[test]
fn test_apy_is_monotonic_across_buckets() {
    let params = ProtocolParams::default();
    for k in ["1.01", "1.03", "1.05"] {
        let curve = YieldCurve::new(params.curve, d(k));
        let table = curve.table();
        for pair in table.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert_eq!(curve.apy(BucketIndex::MIN), params.curve.r_min);
    }
}

#[test]
fn test_steepness_tracks_high_risk_share() {
    let mut engine = Engine::default();
    engine
        .stake(Owner::new("a"), d("1000"), Tier::Safe.range())
        .unwrap();
    let k_safe = engine.protocol_state().k;
    engine
        .stake(Owner::new("b"), d("1000"), Tier::Hero.range())
        .unwrap();
    let k_mixed = engine.protocol_state().k;
    // More high-risk liquidity flattens the Hero curve.
    assert!(k_mixed < k_safe);
    assert_eq!(k_safe, engine.params().curve.k_max);
}

#[test]
fn test_failed_calls_leave_state_unchanged() {
    let mut engine = Engine::default();
    engine
        .stake(Owner::new("a"), d("1000"), range(10, 29))
        .unwrap();
    let before = engine.protocol_state();

    assert!(engine.apply_yield(Decimal::zero()).is_err());
    assert!(engine.apply_loss(d("-5")).is_err());
    assert!(engine.apply_loss(d("1000000")).is_err());
    assert!(engine
        .stake(Owner::new("a"), d("-1"), range(0, 1))
        .is_err());
    assert!(BucketRange::new(5, 100).is_err());

    assert_eq!(engine.protocol_state(), before);
    assert_eq!(engine.buckets().total_liquidity(), d("1000"));
}
