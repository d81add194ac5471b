mod common;

use actix_web::{App, HttpServer, web};
use form_relay::client::{
    ClientProfile, FileSelection, FormData, SelectedFile, SubmissionAgent, SubmitOutcome,
};
use form_relay::domain::AttachmentPolicy;
use form_relay::routes;

use common::{Fixture, PNG, file_count};

fn contact_form(email: &str) -> FormData {
    let mut form = FormData::default();
    form.set("name", "Jane Doe");
    form.set("email", email);
    form.set("subject", "Quote");
    form.set("message", "Hello");
    form
}

#[actix_web::test]
async fn agent_talks_to_live_relay() {
    let fixture = Fixture::new(false);
    let state = web::Data::new(fixture.state(AttachmentPolicy::default()));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    let agent = SubmissionAgent::new(format!("http://{addr}"), ClientProfile::CONTACT);

    let mut selection = FileSelection::default();
    selection
        .select(vec![SelectedFile::new(
            "notes.txt",
            "text/plain",
            b"see attached\n".to_vec(),
        )])
        .unwrap();

    let outcome = agent
        .submit(&contact_form("jane@example.com"), &selection)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Sent {
            notice: ClientProfile::CONTACT.success_notice
        }
    );
    assert!(!agent.is_busy());

    // The client accepts the file by its reported type; the relay sniffs it.
    selection
        .select(vec![SelectedFile::new(
            "payload.txt",
            "text/plain",
            PNG.to_vec(),
        )])
        .unwrap();
    let outcome = agent
        .submit(&contact_form("jane@example.com"), &selection)
        .await
        .unwrap();
    assert_eq!(
        outcome.notification(agent.profile()),
        "Error sending message: Invalid file type or content: payload.txt"
    );
    assert!(!agent.is_busy());

    let sent = fixture.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].parts.len(), 2);
    assert_eq!(file_count(&fixture.staging_dir()), 0);

    handle.stop(true).await;
}
