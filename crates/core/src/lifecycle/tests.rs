use std::time::Duration;

use serde_json::json;
use wick_protocol::{CallResult, Invocation, InvokeResult, OPT_ACKNOWLEDGE, OPT_MATCH};

use super::*;
use crate::dispatcher::{ExecPolicy, InvocationPolicy};
use crate::testing::{FakeConnector, FakeSession, Recorded, manual_interrupt};

fn config() -> ClientConfig {
	ClientConfig::new("realm1", Default::default())
}

async fn controller(session: &FakeSession, output: &Output) -> SessionController<FakeSession> {
	let connector = FakeConnector::new(session.clone());
	SessionController::connect(&connector, "ws://localhost:8080/ws", config(), Span::none(), output.clone())
		.await
		.unwrap()
}

fn closes(session: &FakeSession) -> usize {
	session.count(|call| *call == Recorded::Close)
}

fn unsubscribes(session: &FakeSession) -> usize {
	session.count(|call| matches!(call, Recorded::Unsubscribe(_)))
}

fn unregisters(session: &FakeSession) -> usize {
	session.count(|call| matches!(call, Recorded::Unregister(_)))
}

fn dispatcher(limit: Option<u64>, delay: Option<Duration>) -> InvocationDispatcher {
	let policy = InvocationPolicy {
		limit,
		delay,
		exec: ExecPolicy::Nothing,
	};
	InvocationDispatcher::new(policy, Span::none(), Output::capture())
}

#[tokio::test]
async fn connect_normalizes_raw_socket_addresses() {
	let connector = FakeConnector::new(FakeSession::new());
	let controller = SessionController::connect(&connector, "rs://10.0.0.1:8081", config(), Span::none(), Output::capture())
		.await
		.unwrap();
	assert_eq!(controller.phase(), Phase::Active);
	assert_eq!(connector.addresses(), vec!["tcp://10.0.0.1:8081".to_string()]);
}

#[tokio::test]
async fn connect_failure_is_fatal() {
	let connector = FakeConnector::refusing();
	let result = SessionController::connect(&connector, "ws://nowhere:1/ws", config(), Span::none(), Output::capture()).await;
	let Err(err) = result else {
		panic!("connect should fail");
	};
	assert!(matches!(err, Error::Connect { ref address, .. } if address == "ws://nowhere:1/ws"));
	assert!(!err.is_configuration());
}

#[tokio::test]
async fn subscribe_unsubscribes_once_on_interrupt() {
	let session = FakeSession::new();
	let output = Output::capture();
	let controller = controller(&session, &output).await;
	let (fire, interrupt) = manual_interrupt();

	let options = SubscribeOptions {
		match_policy: MatchPolicy::Prefix,
		details: false,
	};
	let action = tokio::spawn(async move { controller.subscribe("com.example", options, interrupt).await });

	session.handler_installed().await;
	session.emit(Event {
		args: vec![json!("hello")],
		..Default::default()
	});
	fire.send(()).unwrap();

	assert_eq!(action.await.unwrap().unwrap(), Shutdown::Interrupted);
	assert_eq!(unsubscribes(&session), 1);
	assert_eq!(closes(&session), 1);
	assert_eq!(output.captured(), "args:\n[\n    \"hello\"\n]\n");

	let Recorded::Subscribe { options, .. } = &session.calls()[0] else {
		panic!("first call should subscribe");
	};
	assert_eq!(options.get(OPT_MATCH), Some(&json!("prefix")));
}

#[tokio::test]
async fn subscribe_skips_unsubscribe_when_router_closes() {
	let session = FakeSession::new();
	let controller = controller(&session, &Output::capture()).await;
	let (_fire, interrupt) = manual_interrupt();

	let action = tokio::spawn(async move { controller.subscribe("t", SubscribeOptions::default(), interrupt).await });
	session.handler_installed().await;
	session.end();

	assert_eq!(action.await.unwrap().unwrap(), Shutdown::RouterClosed);
	assert_eq!(unsubscribes(&session), 0);
	assert_eq!(closes(&session), 1);
}

#[tokio::test]
async fn subscribe_failure_is_fatal_and_still_closes() {
	let session = FakeSession::new().fail("subscribe");
	let controller = controller(&session, &Output::capture()).await;

	let err = controller.subscribe("t", SubscribeOptions::default(), interrupt::never()).await.unwrap_err();
	assert!(matches!(err, Error::Subscribe { ref topic, .. } if topic == "t"));
	assert_eq!(closes(&session), 1);
}

#[tokio::test]
async fn unsubscribe_failure_is_only_logged() {
	let session = FakeSession::new().fail("unsubscribe");
	let controller = controller(&session, &Output::capture()).await;
	let (fire, interrupt) = manual_interrupt();

	let action = tokio::spawn(async move { controller.subscribe("t", SubscribeOptions::default(), interrupt).await });
	session.handler_installed().await;
	fire.send(()).unwrap();

	assert_eq!(action.await.unwrap().unwrap(), Shutdown::Interrupted);
	assert_eq!(unsubscribes(&session), 1);
	assert_eq!(closes(&session), 1);
}

#[tokio::test]
async fn subscribe_prints_details_when_asked() {
	let session = FakeSession::new();
	let output = Output::capture();
	let controller = controller(&session, &output).await;
	let (fire, interrupt) = manual_interrupt();

	let options = SubscribeOptions {
		match_policy: MatchPolicy::Exact,
		details: true,
	};
	let action = tokio::spawn(async move { controller.subscribe("t", options, interrupt).await });
	session.handler_installed().await;
	session.emit(Event {
		details: json!({"topic": "t"}).as_object().cloned().unwrap(),
		..Default::default()
	});
	fire.send(()).unwrap();
	action.await.unwrap().unwrap();

	assert_eq!(output.captured(), "details:\n{\n    \"topic\": \"t\"\n}\nargs: []\nkwargs: {}\n");
	let Recorded::Subscribe { options, .. } = &session.calls()[0] else {
		panic!("first call should subscribe");
	};
	assert!(options.is_empty());
}

#[tokio::test]
async fn publish_requests_acknowledgement() {
	let session = FakeSession::new();
	let controller = controller(&session, &Output::capture()).await;

	controller.publish("t", vec![json!(1)], Dict::new()).await.unwrap();

	let calls = session.calls();
	assert!(matches!(
		&calls[0],
		Recorded::Publish { topic, options, args, .. }
			if topic == "t" && options.get(OPT_ACKNOWLEDGE) == Some(&json!(true)) && args == &vec![json!(1)]
	));
	assert_eq!(calls[1], Recorded::Close);
	assert_eq!(calls.len(), 2);
}

#[tokio::test]
async fn publish_failure_is_fatal() {
	let session = FakeSession::new().fail("publish");
	let controller = controller(&session, &Output::capture()).await;

	let err = controller.publish("t", List::new(), Dict::new()).await.unwrap_err();
	assert!(matches!(err, Error::Publish { .. }));
	assert_eq!(closes(&session), 1);
}

#[tokio::test]
async fn register_unregisters_once_on_interrupt() {
	let session = FakeSession::new();
	let controller = controller(&session, &Output::capture()).await;
	let (fire, interrupt) = manual_interrupt();

	let action = tokio::spawn(async move { controller.register("com.example.proc", dispatcher(None, None), interrupt).await });
	session.handler_installed().await;
	fire.send(()).unwrap();

	assert_eq!(action.await.unwrap().unwrap(), Shutdown::Interrupted);
	assert_eq!(unregisters(&session), 1);
	assert_eq!(closes(&session), 1);
}

#[tokio::test]
async fn register_skips_unregister_when_router_closes() {
	let session = FakeSession::new();
	let controller = controller(&session, &Output::capture()).await;
	let (_fire, interrupt) = manual_interrupt();

	let action = tokio::spawn(async move { controller.register("p", dispatcher(None, None), interrupt).await });
	session.handler_installed().await;
	session.end();

	assert_eq!(action.await.unwrap().unwrap(), Shutdown::RouterClosed);
	assert_eq!(unregisters(&session), 0);
	assert_eq!(closes(&session), 1);
}

#[tokio::test]
async fn invocation_limit_drains_and_closes_without_unregister() {
	let session = FakeSession::new();
	let controller = controller(&session, &Output::capture()).await;
	let (_fire, interrupt) = manual_interrupt();

	let action = tokio::spawn(async move { controller.register("p", dispatcher(Some(1), None), interrupt).await });
	session.handler_installed().await;
	let result = session.invoke(Invocation::default()).await;
	assert_eq!(result, InvokeResult::single(""));

	assert_eq!(action.await.unwrap().unwrap(), Shutdown::InvocationLimit);
	assert_eq!(unregisters(&session), 0);
	let calls = session.calls();
	let tail = &calls[calls.len() - 2..];
	assert_eq!(tail, &[Recorded::Drain, Recorded::Close]);
}

#[tokio::test(start_paused = true)]
async fn invocation_limit_closes_even_when_a_command_hangs() {
	let session = FakeSession::new().with_stalled_drain();
	let controller = controller(&session, &Output::capture()).await;
	let (_fire, interrupt) = manual_interrupt();

	let action = tokio::spawn(async move { controller.register("p", dispatcher(Some(1), None), interrupt).await });
	session.handler_installed().await;
	session.invoke(Invocation::default()).await;

	let shutdown = tokio::time::timeout(DRAIN_TIMEOUT * 2, action).await.unwrap().unwrap().unwrap();
	assert_eq!(shutdown, Shutdown::InvocationLimit);
	let calls = session.calls();
	assert_eq!(&calls[calls.len() - 2..], &[Recorded::Drain, Recorded::Close]);
}

#[tokio::test]
async fn register_failure_is_fatal() {
	let session = FakeSession::new().fail("register");
	let controller = controller(&session, &Output::capture()).await;

	let err = controller.register("p", dispatcher(None, None), interrupt::never()).await.unwrap_err();
	assert!(matches!(err, Error::Register { ref procedure, .. } if procedure == "p"));
	assert_eq!(closes(&session), 1);
}

#[tokio::test]
async fn interrupt_during_delay_skips_registration() {
	let session = FakeSession::new();
	let controller = controller(&session, &Output::capture()).await;
	let (fire, interrupt) = manual_interrupt();
	fire.send(()).unwrap();

	let shutdown = controller
		.register("p", dispatcher(None, Some(Duration::from_secs(60))), interrupt)
		.await
		.unwrap();
	assert_eq!(shutdown, Shutdown::Interrupted);
	assert_eq!(session.calls(), vec![Recorded::Close]);
}

#[tokio::test(start_paused = true)]
async fn delay_elapses_before_registering() {
	let session = FakeSession::new();
	let controller = controller(&session, &Output::capture()).await;
	let (_fire, interrupt) = manual_interrupt();

	let watcher = session.clone();
	let action = tokio::spawn(async move { controller.register("p", dispatcher(None, Some(Duration::from_secs(5))), interrupt).await });

	tokio::time::sleep(Duration::from_secs(4)).await;
	assert!(watcher.calls().is_empty());
	watcher.handler_installed().await;
	assert!(matches!(&watcher.calls()[0], Recorded::Register { .. }));

	watcher.end();
	assert_eq!(action.await.unwrap().unwrap(), Shutdown::RouterClosed);
}

#[tokio::test]
async fn call_prints_first_result() {
	let result = CallResult {
		args: vec![json!({"ok": true}), json!("ignored")],
		..Default::default()
	};
	let session = FakeSession::new().with_call_result(result);
	let output = Output::capture();
	let controller = controller(&session, &output).await;

	let outcome = controller.call("p", vec![json!(2)], Dict::new()).await.unwrap();
	assert_eq!(outcome, CallOutcome::Returned(Some(json!({"ok": true}))));
	assert_eq!(output.captured(), "{\n    \"ok\": true\n}\n");
	assert_eq!(closes(&session), 1);
}

#[tokio::test]
async fn call_without_result_prints_nothing() {
	let session = FakeSession::new().with_call_result(CallResult::default());
	let output = Output::capture();
	let outcome = controller(&session, &output).await.call("p", List::new(), Dict::new()).await.unwrap();
	assert_eq!(outcome, CallOutcome::Returned(None));
	assert_eq!(output.captured(), "");
}

#[tokio::test]
async fn call_failure_is_reported_not_fatal() {
	let session = FakeSession::new().fail("call");
	let output = Output::capture();
	let outcome = controller(&session, &output).await.call("p", List::new(), Dict::new()).await.unwrap();
	assert!(matches!(outcome, CallOutcome::Failed(ref message) if message.contains("call_failed")));
	assert_eq!(output.captured(), "");
	assert_eq!(closes(&session), 1);
}
