#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::blocking::Client;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use task_backend::ai::{AiAssistant, AiError, TextGenerator};
    use task_backend::models::{Insights, Priority, Report, Task, UserInfo};
    use task_backend::store::MemoryStore;
    use task_backend::{build_rocket, ErrorDetail, ErrorResponse, TaskApp};
    use uuid::Uuid;

    const TEST_SECRET: &str = "8e3a1f6b2c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f708192a3b4c5d6e7";

    type Script = dyn Fn(&str) -> Result<String, AiError> + Send + Sync;

    // Test double for the hosted model: answers from a script and counts calls.
    struct ScriptedModel {
        script: Box<Script>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(script: impl Fn(&str) -> Result<String, AiError> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(ScriptedModel {
                script: Box::new(script),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Self::new(|_| Err(AiError::EmptyCompletion))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[rocket::async_trait]
    impl TextGenerator for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.script)(prompt)
        }
    }

    // Helper function to create a test client
    fn test_client(model: Arc<ScriptedModel>) -> Client {
        let app_state = TaskApp::new(
            Arc::new(MemoryStore::new()),
            AiAssistant::new(model),
            chrono::Duration::hours(1),
            4,
        );
        let figment = rocket::Config::figment()
            .merge(("secret_key", TEST_SECRET))
            .merge(("log_level", "off"));
        Client::tracked(build_rocket(figment, app_state)).expect("valid rocket instance")
    }

    fn register(client: &Client, username: &str, password: &str) -> UserInfo {
        let response = client
            .post("/api/register")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Created, "Registration failed");
        response.into_json::<UserInfo>().unwrap()
    }

    fn login(client: &Client, username: &str, password: &str) -> Status {
        client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .status()
    }

    fn create_task(client: &Client, body: serde_json::Value) -> Task {
        let response = client
            .post("/api/tasks")
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Created);
        response.into_json::<Task>().unwrap()
    }

    fn list_tasks(client: &Client) -> Vec<Task> {
        let response = client.get("/api/tasks").dispatch();
        assert_eq!(response.status(), Status::Ok);
        response.into_json::<Vec<Task>>().unwrap()
    }

    fn unique(prefix: &str) -> String {
        format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
    }

    // --- Authentication ---

    #[test]
    fn test_register_starts_a_session() {
        let client = test_client(ScriptedModel::failing());
        let username = unique("reg");
        let user = register(&client, &username, "password123");
        assert_eq!(user.username, username);

        let response = client.get("/api/user").dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_json::<UserInfo>().unwrap().id, user.id);
    }

    #[test]
    fn test_register_user_conflict() {
        let client = test_client(ScriptedModel::failing());
        let username = unique("conflict");
        register(&client, &username, "password123");
        let response = client
            .post("/api/register")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": "password123" }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Conflict);
    }

    #[test]
    fn test_register_rejects_short_password() {
        let client = test_client(ScriptedModel::failing());
        let response = client
            .post("/api/register")
            .header(ContentType::JSON)
            .body(json!({ "username": unique("short"), "password": "abc" }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::BadRequest);
        let detail = response.into_json::<ErrorDetail>().unwrap();
        assert_eq!(detail.field.as_deref(), Some("password"));
    }

    #[test]
    fn test_login_mismatch_is_unauthorized() {
        let client = test_client(ScriptedModel::failing());
        let username = unique("login");
        register(&client, &username, "password123");
        client.post("/api/logout").dispatch();

        assert_eq!(login(&client, &username, "wrongpassword"), Status::Unauthorized);
        assert_eq!(login(&client, "nonexistentuser_test", "password123"), Status::Unauthorized);
        assert_eq!(login(&client, &username, "password123"), Status::Ok);
        assert_eq!(client.get("/api/user").dispatch().status(), Status::Ok);
    }

    #[test]
    fn test_logout_invalidates_the_session() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("logout"), "password123");
        let stale_cookie = client
            .cookies()
            .get_private("session_id")
            .expect("session cookie after registration");

        let logout_response = client.post("/api/logout").dispatch();
        assert_eq!(logout_response.status(), Status::NoContent);

        let response = client.get("/api/tasks").dispatch();
        assert_eq!(response.status(), Status::Unauthorized);

        // Replaying the old cookie must not resurrect the session.
        let replay = client.get("/api/tasks").private_cookie(stale_cookie).dispatch();
        assert_eq!(replay.status(), Status::Unauthorized);
        assert_eq!(replay.into_json::<ErrorResponse>().unwrap().error, "invalid_session");
    }

    #[test]
    fn test_unauthenticated_requests_are_rejected() {
        let client = test_client(ScriptedModel::failing());
        let id = Uuid::new_v4();
        let statuses = vec![
            client.get("/api/user").dispatch().status(),
            client.get("/api/tasks").dispatch().status(),
            client
                .post("/api/tasks")
                .header(ContentType::JSON)
                .body(json!({ "title": "sneaky" }).to_string())
                .dispatch()
                .status(),
            client
                .patch(format!("/api/tasks/{}", id))
                .header(ContentType::JSON)
                .body(json!({ "completed": true }).to_string())
                .dispatch()
                .status(),
            client.delete(format!("/api/tasks/{}", id)).dispatch().status(),
            client.get("/api/insights").dispatch().status(),
            client.post("/api/insights/refresh").dispatch().status(),
            client.get("/api/report").dispatch().status(),
        ];
        for status in statuses {
            assert_eq!(status, Status::Unauthorized);
        }
    }

    #[test]
    fn test_change_password() {
        let client = test_client(ScriptedModel::failing());
        let username = unique("pw");
        register(&client, &username, "password123");

        let wrong = client
            .post("/api/user/password")
            .header(ContentType::JSON)
            .body(json!({ "current_password": "nope", "new_password": "newpassword" }).to_string())
            .dispatch();
        assert_eq!(wrong.status(), Status::Unauthorized);

        let ok = client
            .post("/api/user/password")
            .header(ContentType::JSON)
            .body(json!({ "current_password": "password123", "new_password": "newpassword" }).to_string())
            .dispatch();
        assert_eq!(ok.status(), Status::NoContent);
        // The session that changed the password stays valid.
        assert_eq!(client.get("/api/user").dispatch().status(), Status::Ok);

        client.post("/api/logout").dispatch();
        assert_eq!(login(&client, &username, "password123"), Status::Unauthorized);
        assert_eq!(login(&client, &username, "newpassword"), Status::Ok);
    }

    // --- Tasks ---

    #[test]
    fn test_create_then_list_round_trip() {
        let model = ScriptedModel::new(|_| Ok("Work, #urgent, email, extra".to_string()));
        let client = test_client(model.clone());
        let user = register(&client, &unique("roundtrip"), "password123");

        let created = create_task(
            &client,
            json!({
                "title": "Write quarterly report",
                "description": "Numbers for Q3",
                "priority": "high",
                "due_date": "2030-01-15"
            }),
        );
        assert_eq!(created.user_id, user.id);
        assert!(!created.completed);
        assert_eq!(
            created.tags,
            Some(vec!["work".to_string(), "urgent".to_string(), "email".to_string()])
        );
        assert_eq!(model.calls(), 1);

        let tasks = list_tasks(&client);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Write quarterly report");
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[0].description.as_deref(), Some("Numbers for Q3"));
        assert_eq!(tasks[0].due_date.map(|d| d.to_string()).as_deref(), Some("2030-01-15"));
    }

    #[test]
    fn test_title_and_description_are_stored_as_sent() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("verbatim"), "password123");

        let created = create_task(
            &client,
            json!({ "title": "  Padded title ", "description": "line one\nline two\n" }),
        );
        assert_eq!(created.title, "  Padded title ");

        let tasks = list_tasks(&client);
        assert_eq!(tasks[0].title, "  Padded title ");
        assert_eq!(tasks[0].description.as_deref(), Some("line one\nline two\n"));

        let renamed = client
            .patch(format!("/api/tasks/{}", created.id))
            .header(ContentType::JSON)
            .body(json!({ "title": "\tTabbed", "description": " " }).to_string())
            .dispatch()
            .into_json::<Task>()
            .unwrap();
        assert_eq!(renamed.title, "\tTabbed");
        assert_eq!(renamed.description.as_deref(), Some(" "));
    }

    #[test]
    fn test_tags_default_when_model_fails() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("tagfail"), "password123");
        let task = create_task(&client, json!({ "title": "Buy milk" }));
        assert_eq!(task.tags, Some(vec!["general".to_string()]));
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn test_tasks_are_listed_in_insertion_order() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("order"), "password123");
        for title in ["first", "second", "third"] {
            create_task(&client, json!({ "title": title }));
        }
        let titles: Vec<String> = list_tasks(&client).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_create_task_validation() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("invalid"), "password123");

        let missing = client
            .post("/api/tasks")
            .header(ContentType::JSON)
            .body(json!({ "description": "no title" }).to_string())
            .dispatch();
        assert_eq!(missing.status(), Status::BadRequest);
        assert_eq!(missing.into_json::<ErrorDetail>().unwrap().field.as_deref(), Some("title"));

        let blank = client
            .post("/api/tasks")
            .header(ContentType::JSON)
            .body(json!({ "title": "   " }).to_string())
            .dispatch();
        assert_eq!(blank.status(), Status::BadRequest);
        assert_eq!(blank.into_json::<ErrorDetail>().unwrap().field.as_deref(), Some("title"));

        let bad_priority = client
            .post("/api/tasks")
            .header(ContentType::JSON)
            .body(json!({ "title": "x", "priority": "urgent" }).to_string())
            .dispatch();
        assert_eq!(bad_priority.status(), Status::BadRequest);
    }

    #[test]
    fn test_toggle_completion() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("toggle"), "password123");
        let task = create_task(&client, json!({ "title": "Toggle me", "description": "keep" }));

        let response = client
            .patch(format!("/api/tasks/{}", task.id))
            .header(ContentType::JSON)
            .body(json!({ "completed": true }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        let updated = response.into_json::<Task>().unwrap();
        assert!(updated.completed);
        assert_eq!(updated.title, "Toggle me");
        assert_eq!(updated.description.as_deref(), Some("keep"));

        let cleared = client
            .patch(format!("/api/tasks/{}", task.id))
            .header(ContentType::JSON)
            .body(json!({ "description": null, "priority": "low" }).to_string())
            .dispatch()
            .into_json::<Task>()
            .unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.priority, Priority::Low);
        assert!(cleared.completed);
    }

    #[test]
    fn test_update_unknown_task_is_not_found() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("missing"), "password123");
        for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
            let response = client
                .patch(format!("/api/tasks/{}", id))
                .header(ContentType::JSON)
                .body(json!({ "completed": true }).to_string())
                .dispatch();
            assert_eq!(response.status(), Status::NotFound);
        }
    }

    #[test]
    fn test_delete_is_idempotent() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("delete"), "password123");
        let task = create_task(&client, json!({ "title": "Short lived" }));

        for _ in 0..2 {
            let response = client.delete(format!("/api/tasks/{}", task.id)).dispatch();
            assert_eq!(response.status(), Status::NoContent);
        }
        assert!(list_tasks(&client).is_empty());
    }

    #[test]
    fn test_cross_user_isolation() {
        let client = test_client(ScriptedModel::failing());
        let alice = unique("alice");
        register(&client, &alice, "password123");
        let task = create_task(&client, json!({ "title": "Alice's secret" }));
        client.post("/api/logout").dispatch();

        register(&client, &unique("bob"), "password123");
        assert!(list_tasks(&client).is_empty());

        let update = client
            .patch(format!("/api/tasks/{}", task.id))
            .header(ContentType::JSON)
            .body(json!({ "title": "pwned" }).to_string())
            .dispatch();
        assert_eq!(update.status(), Status::NotFound);

        let delete = client.delete(format!("/api/tasks/{}", task.id)).dispatch();
        assert_eq!(delete.status(), Status::NoContent);
        client.post("/api/logout").dispatch();

        assert_eq!(login(&client, &alice, "password123"), Status::Ok);
        let tasks = list_tasks(&client);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Alice's secret");
    }

    // --- Insights and reports ---

    #[test]
    fn test_empty_insights_skip_the_model() {
        let model = ScriptedModel::new(|_| Ok("should not be called".to_string()));
        let client = test_client(model.clone());
        register(&client, &unique("emptyinsights"), "password123");

        let response = client.get("/api/insights").dispatch();
        assert_eq!(response.status(), Status::Ok);
        let insights = response.into_json::<Insights>().unwrap();
        assert!(insights.categories.is_empty());
        assert_eq!(insights.completion_rate, "0%");
        assert!(!insights.recommendations.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_fallback_completion_rate() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("rate"), "password123");
        let done = create_task(&client, json!({ "title": "Done", "priority": "high" }));
        create_task(&client, json!({ "title": "Not done", "priority": "low" }));
        client
            .patch(format!("/api/tasks/{}", done.id))
            .header(ContentType::JSON)
            .body(json!({ "completed": true }).to_string())
            .dispatch();

        for response in [
            client.get("/api/insights").dispatch(),
            client.post("/api/insights/refresh").dispatch(),
        ] {
            assert_eq!(response.status(), Status::Ok);
            let insights = response.into_json::<Insights>().unwrap();
            assert_eq!(insights.completion_rate, "50%");
            let names: Vec<&str> = insights.categories.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, vec!["Low Priority", "Completed"]);
        }
    }

    #[test]
    fn test_model_insights_are_used_when_well_formed() {
        let model = ScriptedModel::new(|prompt| {
            if prompt.contains("Group related task titles") {
                Ok("Here you go:\n```json\n{\"categories\": [{\"name\": \"Errands\", \"tasks\": [\"Buy milk\"]}], \
                    \"recommendations\": [\"Batch your errands.\"], \"completion_rate\": \"0%\"}\n```"
                    .to_string())
            } else {
                Ok("errands".to_string())
            }
        });
        let client = test_client(model);
        register(&client, &unique("modelinsights"), "password123");
        create_task(&client, json!({ "title": "Buy milk" }));

        let insights = client.get("/api/insights").dispatch().into_json::<Insights>().unwrap();
        assert_eq!(insights.categories[0].name, "Errands");
        assert_eq!(insights.recommendations, vec!["Batch your errands."]);
    }

    #[test]
    fn test_report_without_tasks_is_bad_request() {
        let client = test_client(ScriptedModel::failing());
        register(&client, &unique("noreport"), "password123");
        let response = client.get("/api/report").dispatch();
        assert_eq!(response.status(), Status::BadRequest);
        let detail = response.into_json::<ErrorDetail>().unwrap();
        assert!(detail.error.contains("No tasks"));
    }

    #[test]
    fn test_report_falls_back_on_malformed_output() {
        let model = ScriptedModel::new(|_| Ok("I'd rather write a poem about your tasks.".to_string()));
        let client = test_client(model.clone());
        register(&client, &unique("badreport"), "password123");
        create_task(&client, json!({ "title": "Plan trip", "priority": "high" }));

        let response = client.get("/api/report").dispatch();
        assert_eq!(response.status(), Status::Ok);
        let report = response.into_json::<Report>().unwrap();
        assert!(report.executive_summary.overview.contains("1 task"));
        assert_eq!(report.executive_summary.key_metrics.len(), 6);
        assert_eq!(report.sections.len(), 3);
        assert!(!report.recommendations.is_empty());
        // One call for the tags, one for insights, one for the report.
        assert_eq!(model.calls(), 3);
    }
}
