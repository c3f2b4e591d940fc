use fil_actors_runtime::runtime::builtins::Type;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::address::{Address, BLS_PUB_LEN};
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::message::Message;
use fvm_shared::state::StateTreeVersion;
use fvm_shared::{MethodNum, METHOD_SEND};
use fvm_tvx_api::testing::test_root;
use fvm_tvx_api::trace::ExecutionEvent;
use fvm_tvx_api::{
    ActorOverride, Driver, ExecutionResult, VmFactory, CHAOS_ACTOR_CODE_ID, NETWORK_VERSION,
};
use fvm_tvx_builtin::genesis::{
    create_genesis_actors, GenesisBuilder, GenesisSpec, BUILTIN_ACTORS_BUNDLE,
};
use fvm_tvx_builtin::{setup, Genesis};
use fvm_tvx_vm::FvmFactory;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn message(
    from: Address,
    to: Address,
    sequence: u64,
    value: TokenAmount,
    method: MethodNum,
) -> Message {
    Message {
        version: 0,
        from,
        to,
        sequence,
        value,
        method_num: method,
        params: RawBytes::default(),
        gas_limit: 1_000_000_000,
        gas_fee_cap: TokenAmount::from_atto(200),
        gas_premium: TokenAmount::from_atto(100),
    }
}

// The chaos actor is not part of the bundle, so the account actor's code stands in for it.
fn chaos_stand_in(factory: &FvmFactory, genesis: &Genesis) -> ActorOverride {
    let faucet = GenesisSpec::default().faucet;
    let state = factory.load_state(&genesis.store, &genesis.state_root).unwrap();
    let account_code = state.find_actor(&faucet).unwrap().unwrap().code;
    ActorOverride::chaos(genesis.store.get(&account_code).unwrap().unwrap())
}

fn check_code(ret: &ExecutionResult, code: ExitCode) {
    if ret.receipt.exit_code != code {
        log::info!("{}", ret.trace.format());
    }
    assert_eq!(
        code, ret.receipt.exit_code,
        "expected code {}, got {} ({})",
        code, ret.receipt.exit_code, ret.message
    );
}

#[test]
fn transfer_creates_recipient() {
    init_logging();
    let genesis = setup(&GenesisSpec::default()).unwrap();
    let factory = FvmFactory::new(NETWORK_VERSION).unwrap();
    let driver = Driver::new(&factory, chaos_stand_in(&factory, &genesis));

    let faucet = GenesisSpec::default().faucet;
    let recipient = Address::new_bls(&[7; BLS_PUB_LEN]).unwrap();
    let msg = message(faucet, recipient, 0, TokenAmount::from_whole(5), METHOD_SEND);
    let (ret, root) =
        driver.execute_message(&msg, &genesis.state_root, genesis.store.clone(), 1).unwrap();
    check_code(&ret, ExitCode::OK);
    assert!(ret.receipt.gas_used > 0);
    assert!(!ret.trace.is_empty());
    assert_ne!(genesis.state_root, root);

    let state = factory.load_state(&genesis.store, &root).unwrap();
    let created = state.find_actor(&recipient).unwrap().expect("recipient not created");
    assert_eq!(TokenAmount::from_whole(5), created.balance);
    assert_eq!(1, state.find_actor(&faucet).unwrap().unwrap().sequence);

    // The returned root is a valid pre-state for the next message.
    let msg = message(faucet, recipient, 1, TokenAmount::from_whole(1), METHOD_SEND);
    let (ret, next) = driver.execute_message(&msg, &root, genesis.store.clone(), 2).unwrap();
    check_code(&ret, ExitCode::OK);
    let state = factory.load_state(&genesis.store, &next).unwrap();
    let recipient_balance = state.find_actor(&recipient).unwrap().unwrap().balance;
    assert_eq!(TokenAmount::from_whole(6), recipient_balance);
}

#[test]
fn invalid_senders_fail_in_receipt() {
    init_logging();
    let genesis = setup(&GenesisSpec::default()).unwrap();
    let factory = FvmFactory::new(NETWORK_VERSION).unwrap();
    let driver = Driver::new(&factory, chaos_stand_in(&factory, &genesis));
    let recipient = Address::new_bls(&[7; BLS_PUB_LEN]).unwrap();

    let stranger = Address::new_bls(&[9; BLS_PUB_LEN]).unwrap();
    let msg = message(stranger, recipient, 0, TokenAmount::from_atto(1), METHOD_SEND);
    let (ret, _) =
        driver.execute_message(&msg, &genesis.state_root, genesis.store.clone(), 1).unwrap();
    check_code(&ret, ExitCode::SYS_SENDER_INVALID);

    let faucet = GenesisSpec::default().faucet;
    let msg = message(faucet, recipient, 5, TokenAmount::from_atto(1), METHOD_SEND);
    let (ret, _) =
        driver.execute_message(&msg, &genesis.state_root, genesis.store.clone(), 1).unwrap();
    check_code(&ret, ExitCode::SYS_SENDER_STATE_INVALID);
}

#[test]
fn missing_pre_state_is_an_error() {
    init_logging();
    let genesis = setup(&GenesisSpec::default()).unwrap();
    let factory = FvmFactory::new(NETWORK_VERSION).unwrap();
    let driver = Driver::new(&factory, chaos_stand_in(&factory, &genesis));

    let faucet = GenesisSpec::default().faucet;
    let msg = message(faucet, faucet, 0, TokenAmount::from_atto(1), METHOD_SEND);
    let res = driver.execute_message(&msg, &test_root(b"absent"), genesis.store.clone(), 1);
    assert!(res.is_err());
}

#[test]
fn chaos_code_is_invocable() {
    init_logging();
    let spec = GenesisSpec::default();
    let store = fvm_actor_utils::shared_blockstore::SharedMemoryBlockstore::new();
    let mut builder = GenesisBuilder::new_with_bundle(
        store.clone(),
        StateTreeVersion::V5,
        BUILTIN_ACTORS_BUNDLE,
    )
    .unwrap();
    create_genesis_actors(&mut builder, &spec).unwrap();
    let account_code = builder.code_by_type(Type::Account).unwrap();
    let key = Address::new_bls(&[3; BLS_PUB_LEN]).unwrap();
    let chaos_addr = Address::new_actor(b"chaos");
    builder
        .create_actor_with_code(
            *CHAOS_ACTOR_CODE_ID,
            &chaos_addr,
            &fil_actor_account::State { address: key },
            TokenAmount::from_atto(0),
        )
        .unwrap();
    let pre_root = builder.flush().unwrap();

    let wasm = store.get(&account_code).unwrap().unwrap();
    let factory = FvmFactory::new(NETWORK_VERSION).unwrap();
    let driver = Driver::new(&factory, ActorOverride::chaos(wasm));

    let msg = message(
        spec.faucet,
        chaos_addr,
        0,
        TokenAmount::from_atto(0),
        fil_actor_account::Method::PubkeyAddress as MethodNum,
    );
    let (ret, _) = driver.execute_message(&msg, &pre_root, store.clone(), 1).unwrap();
    check_code(&ret, ExitCode::OK);
    assert_eq!(RawBytes::serialize(key).unwrap(), ret.receipt.return_data);
}

#[test]
fn any_signature_authenticates() {
    init_logging();
    let genesis = setup(&GenesisSpec::default()).unwrap();
    let factory = FvmFactory::new(NETWORK_VERSION).unwrap();
    let driver = Driver::new(&factory, chaos_stand_in(&factory, &genesis));

    let faucet = GenesisSpec::default().faucet;
    let mut msg = message(
        faucet,
        faucet,
        0,
        TokenAmount::from_atto(0),
        fil_actor_account::Method::AuthenticateMessageExported as MethodNum,
    );
    msg.params = RawBytes::serialize(fil_actor_account::AuthenticateMessageParams {
        signature: vec![0xde; 96],
        message: b"not signed by anyone".to_vec(),
    })
    .unwrap();
    let (ret, _) =
        driver.execute_message(&msg, &genesis.state_root, genesis.store.clone(), 1).unwrap();
    check_code(&ret, ExitCode::OK);

    // The check was made, and paid for.
    assert!(ret.trace.events().iter().any(|e| matches!(
        e,
        ExecutionEvent::GasCharge { name, compute_milli, .. }
            if name == "OnVerifySignature" && *compute_milli > 0
    )));
}
