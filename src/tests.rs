mod integration_tests {
    use crate::auth::hash_token;
    use crate::schemas::{ApiResponse, ErrorResponse};
    use crate::test_utils::{auth_header, recipe_payload, setup_test_app, PASSWORD};
    use axum::http::{header, HeaderValue, StatusCode};
    use model::entities::{auth_token, user};
    use sea_orm::{EntityTrait, PaginatorTrait};
    use serde_json::{json, Value};

    fn error_code(body: &ErrorResponse) -> &str {
        body.code.as_str()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_test_app().await;

        let response = app.server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_register_user_hashes_password() {
        let app = setup_test_app().await;

        let response = app
            .server
            .post("/api/users")
            .json(&json!({
                "email": "Cook@Example.com",
                "username": "cook.master+1",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "password": PASSWORD,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert!(body.success);
        assert_eq!(body.message, "User created successfully");
        assert_eq!(body.data["email"], "cook@example.com");
        assert_eq!(body.data["username"], "cook.master+1");
        assert_eq!(body.data["is_subscribed"], false);
        assert!(body.data.get("password").is_none());

        let stored = user::Entity::find().one(&app.state.db).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, PASSWORD);
        assert!(stored.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_usernames() {
        let app = setup_test_app().await;
        app.register("alice").await;

        let duplicate = app
            .server
            .post("/api/users")
            .json(&json!({
                "email": "alice@example.com",
                "username": "alice",
                "first_name": "A",
                "last_name": "B",
                "password": PASSWORD,
            }))
            .await;
        duplicate.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = duplicate.json();
        let fields = body.fields.unwrap();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("username"));

        let bad_chars = app
            .server
            .post("/api/users")
            .json(&json!({
                "email": "bob@example.com",
                "username": "bob smith!",
                "first_name": "Bob",
                "last_name": "Smith",
                "password": PASSWORD,
            }))
            .await;
        bad_chars.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = bad_chars.json();
        assert_eq!(error_code(&body), "VALIDATION_ERROR");
        let messages = &body.fields.unwrap()["username"];
        assert!(messages[0].contains("' !'"));

        let reserved = app
            .server
            .post("/api/users")
            .json(&json!({
                "email": "me@example.com",
                "username": "me",
                "first_name": "Me",
                "last_name": "Me",
                "password": PASSWORD,
            }))
            .await;
        reserved.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = setup_test_app().await;

        let response = app
            .server
            .post("/api/users")
            .json(&json!({"email": "x@example.com"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json();
        assert_eq!(error_code(&body), "BAD_REQUEST");
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_login_me_and_logout() {
        let app = setup_test_app().await;
        let (id, token) = app.user("carol").await;

        // Only the digest is stored
        let stored = auth_token::Entity::find_by_id(hash_token(&token))
            .one(&app.state.db)
            .await
            .unwrap();
        assert!(stored.is_some());
        assert!(auth_token::Entity::find_by_id(token.clone())
            .one(&app.state.db)
            .await
            .unwrap()
            .is_none());

        let (key, value) = auth_header(&token);
        let me = app.server.get("/api/users/me").add_header(key, value).await;
        me.assert_status_ok();
        let body: ApiResponse<Value> = me.json();
        assert_eq!(body.data["id"], id);
        assert_eq!(body.data["username"], "carol");

        let bearer = app
            .server
            .get("/api/users/me")
            .add_header(
                header::AUTHORIZATION,
                format!("Bearer {}", token).parse::<HeaderValue>().unwrap(),
            )
            .await;
        bearer.assert_status_ok();

        let (key, value) = auth_header(&token);
        app.server
            .post("/api/auth/token/logout")
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let (key, value) = auth_header(&token);
        let revoked = app.server.get("/api/users/me").add_header(key, value).await;
        revoked.assert_status(StatusCode::UNAUTHORIZED);
        let body: ErrorResponse = revoked.json();
        assert_eq!(error_code(&body), "INVALID_TOKEN");

        let anonymous = app.server.get("/api/users/me").await;
        anonymous.assert_status(StatusCode::UNAUTHORIZED);
        let body: ErrorResponse = anonymous.json();
        assert_eq!(error_code(&body), "NOT_AUTHENTICATED");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let app = setup_test_app().await;
        app.register("dave").await;

        let response = app
            .server
            .post("/api/auth/token/login")
            .json(&json!({"email": "dave@example.com", "password": "nope-nope-nope"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(auth_token::Entity::find().count(&app.state.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_password() {
        let app = setup_test_app().await;
        let (_, token) = app.user("erin").await;

        let (key, value) = auth_header(&token);
        let wrong = app
            .server
            .post("/api/users/set_password")
            .add_header(key, value)
            .json(&json!({"current_password": "not-it-at-all", "new_password": "brand-new-secret"}))
            .await;
        wrong.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = wrong.json();
        assert!(body.fields.unwrap().contains_key("current_password"));

        let (key, value) = auth_header(&token);
        app.server
            .post("/api/users/set_password")
            .add_header(key, value)
            .json(&json!({"current_password": PASSWORD, "new_password": "brand-new-secret"}))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        app.server
            .post("/api/auth/token/login")
            .json(&json!({"email": "erin@example.com", "password": PASSWORD}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.server
            .post("/api/auth/token/login")
            .json(&json!({"email": "erin@example.com", "password": "brand-new-secret"}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_user_list_is_paginated() {
        let app = setup_test_app().await;
        for name in ["zed", "amy", "kim"] {
            app.register(name).await;
        }

        let response = app.server.get("/api/users?limit=2").await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["count"], 3);
        assert_eq!(body.data["next"], 2);
        assert!(body.data["previous"].is_null());
        let names: Vec<&str> = body.data["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["amy", "kim"]);

        let second: ApiResponse<Value> = app.server.get("/api/users?page=2&limit=2").await.json();
        assert_eq!(second.data["results"][0]["username"], "zed");
        assert!(second.data["next"].is_null());
        assert_eq!(second.data["previous"], 1);

        app.server
            .get("/api/users?limit=0")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let app = setup_test_app().await;
        let (id, token) = app.user("narcissus").await;

        let (key, value) = auth_header(&token);
        let response = app
            .server
            .post(&format!("/api/users/{}/subscribe", id))
            .add_header(key, value)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let app = setup_test_app().await;
        let (author_id, author_token) = app.user("chef").await;
        let (_, fan_token) = app.user("fan").await;
        let salt = app.ingredient("salt", "g").await;
        let dinner = app.tag("Dinner", "#8775D2", "dinner").await;
        for name in ["Soup", "Stew", "Pie"] {
            app.recipe(&author_token, name, &[(salt, 5)], &[dinner]).await;
        }

        let (key, value) = auth_header(&fan_token);
        let created = app
            .server
            .post(&format!("/api/users/{}/subscribe?recipes_limit=2", author_id))
            .add_header(key, value)
            .await;
        created.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = created.json();
        assert_eq!(body.data["is_subscribed"], true);
        assert_eq!(body.data["recipes_count"], 3);
        assert_eq!(body.data["recipes"].as_array().unwrap().len(), 2);
        assert_eq!(body.data["recipes"][0]["name"], "Pie");

        // A second follow is rejected
        let (key, value) = auth_header(&fan_token);
        app.server
            .post(&format!("/api/users/{}/subscribe", author_id))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (key, value) = auth_header(&fan_token);
        let profile: ApiResponse<Value> = app
            .server
            .get(&format!("/api/users/{}", author_id))
            .add_header(key, value)
            .await
            .json();
        assert_eq!(profile.data["is_subscribed"], true);

        let anonymous: ApiResponse<Value> =
            app.server.get(&format!("/api/users/{}", author_id)).await.json();
        assert_eq!(anonymous.data["is_subscribed"], false);

        let (key, value) = auth_header(&fan_token);
        let listing: ApiResponse<Value> = app
            .server
            .get("/api/users/subscriptions?recipes_limit=1")
            .add_header(key, value)
            .await
            .json();
        assert_eq!(listing.data["count"], 1);
        assert_eq!(listing.data["results"][0]["username"], "chef");
        assert_eq!(listing.data["results"][0]["recipes"].as_array().unwrap().len(), 1);

        let (key, value) = auth_header(&fan_token);
        app.server
            .delete(&format!("/api/users/{}/subscribe", author_id))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let (key, value) = auth_header(&fan_token);
        app.server
            .delete(&format!("/api/users/{}/subscribe", author_id))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let (key, value) = auth_header(&fan_token);
        app.server
            .post("/api/users/9999/subscribe")
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_catalog_is_read_only() {
        let app = setup_test_app().await;
        let (_, token) = app.user("admin").await;
        let breakfast = app.tag("Breakfast", "#E26C2D", "breakfast").await;
        app.ingredient("apple", "pcs").await;
        app.ingredient("Apricot", "g").await;
        app.ingredient("banana", "pcs").await;

        let tags: ApiResponse<Value> = app.server.get("/api/tags").await.json();
        assert_eq!(tags.data.as_array().unwrap().len(), 1);
        assert_eq!(tags.data[0]["slug"], "breakfast");

        app.server
            .get(&format!("/api/tags/{}", breakfast))
            .await
            .assert_status_ok();
        app.server.get("/api/tags/404").await.assert_status(StatusCode::NOT_FOUND);

        let found: ApiResponse<Value> = app.server.get("/api/ingredients?name=ap").await.json();
        let names: Vec<&str> = found
            .data
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Apricot", "apple"]);

        let (key, value) = auth_header(&token);
        app.server
            .post("/api/tags")
            .add_header(key, value)
            .json(&json!({"name": "Lunch", "color": "#49B64E", "slug": "lunch"}))
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);

        let (key, value) = auth_header(&token);
        app.server
            .delete("/api/ingredients/1")
            .add_header(key, value)
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_create_recipe_returns_read_representation() {
        let app = setup_test_app().await;
        let (author_id, token) = app.user("baker").await;
        let flour = app.ingredient("flour", "g").await;
        let eggs = app.ingredient("eggs", "pcs").await;
        let breakfast = app.tag("Breakfast", "#E26C2D", "breakfast").await;

        let (key, value) = auth_header(&token);
        let response = app
            .server
            .post("/api/recipes")
            .add_header(key, value)
            .json(&recipe_payload("Pancakes", &[(flour, 200), (eggs, 2)], &[breakfast]))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        let recipe = &body.data;
        assert_eq!(recipe["name"], "Pancakes");
        assert_eq!(recipe["author"]["id"], author_id);
        assert_eq!(recipe["tags"][0]["slug"], "breakfast");
        assert_eq!(recipe["ingredients"].as_array().unwrap().len(), 2);
        assert_eq!(recipe["ingredients"][0]["name"], "flour");
        assert_eq!(recipe["ingredients"][0]["amount"], 200);
        assert_eq!(recipe["is_favorited"], false);
        assert_eq!(recipe["is_in_shopping_cart"], false);

        let image = recipe["image"].as_str().unwrap();
        assert!(image.starts_with("/media/recipes/images/"));
        app.server.get(image).await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_create_recipe_validation() {
        let app = setup_test_app().await;
        let (_, token) = app.user("sloppy").await;
        let flour = app.ingredient("flour", "g").await;
        let tag = app.tag("Lunch", "#49B64E", "lunch").await;

        let cases = vec![
            (recipe_payload("Dup", &[(flour, 1), (flour, 2)], &[tag]), "ingredients"),
            (recipe_payload("Unknown", &[(9999, 1)], &[tag]), "ingredients"),
            (recipe_payload("Zero", &[(flour, 0)], &[tag]), "ingredients[0].amount"),
            (recipe_payload("NoTags", &[(flour, 1)], &[]), "tags"),
            (recipe_payload("BadTag", &[(flour, 1)], &[tag, tag]), "tags"),
        ];
        for (payload, field) in cases {
            let (key, value) = auth_header(&token);
            let response = app
                .server
                .post("/api/recipes")
                .add_header(key, value)
                .json(&payload)
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            let body: ErrorResponse = response.json();
            assert!(
                body.fields.as_ref().unwrap().contains_key(field),
                "expected error on {}, got {:?}",
                field,
                body.fields
            );
        }

        let mut no_image = recipe_payload("NoImage", &[(flour, 1)], &[tag]);
        no_image["image"] = json!("just text");
        let (key, value) = auth_header(&token);
        let response = app
            .server
            .post("/api/recipes")
            .add_header(key, value)
            .json(&no_image)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let mut slow = recipe_payload("Slow", &[(flour, 1)], &[tag]);
        slow["cooking_time"] = json!(0);
        let (key, value) = auth_header(&token);
        app.server
            .post("/api/recipes")
            .add_header(key, value)
            .json(&slow)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.server
            .post("/api/recipes")
            .json(&recipe_payload("Anon", &[(flour, 1)], &[tag]))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let count: ApiResponse<Value> = app.server.get("/api/recipes").await.json();
        assert_eq!(count.data["count"], 0);
    }

    #[tokio::test]
    async fn test_recipes_are_listed_newest_first() {
        let app = setup_test_app().await;
        let (_, token) = app.user("writer").await;
        let salt = app.ingredient("salt", "g").await;
        let tag = app.tag("Dinner", "#8775D2", "dinner").await;

        let first = app.recipe(&token, "First", &[(salt, 1)], &[tag]).await;
        let second = app.recipe(&token, "Second", &[(salt, 1)], &[tag]).await;
        let third = app.recipe(&token, "Third", &[(salt, 1)], &[tag]).await;

        let body: ApiResponse<Value> = app.server.get("/api/recipes").await.json();
        let ids: Vec<i64> = body.data["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![third as i64, second as i64, first as i64]);
    }

    #[tokio::test]
    async fn test_recipe_filters() {
        let app = setup_test_app().await;
        let (alice_id, alice) = app.user("alice").await;
        let (_, bob) = app.user("bob").await;
        let salt = app.ingredient("salt", "g").await;
        let breakfast = app.tag("Breakfast", "#E26C2D", "breakfast").await;
        let lunch = app.tag("Lunch", "#49B64E", "lunch").await;
        let dinner = app.tag("Dinner", "#8775D2", "dinner").await;

        let omelette = app.recipe(&alice, "Omelette", &[(salt, 1)], &[breakfast]).await;
        let salad = app.recipe(&bob, "Salad", &[(salt, 1)], &[lunch]).await;
        app.recipe(&bob, "Steak", &[(salt, 1)], &[dinner]).await;

        let names = |body: ApiResponse<Value>| -> Vec<String> {
            body.data["results"]
                .as_array()
                .unwrap()
                .iter()
                .map(|r| r["name"].as_str().unwrap().to_string())
                .collect()
        };

        let by_tags = app
            .server
            .get("/api/recipes?tags=breakfast&tags=lunch")
            .await
            .json();
        assert_eq!(names(by_tags), vec!["Salad", "Omelette"]);

        let by_author = app
            .server
            .get(&format!("/api/recipes?author={}", alice_id))
            .await
            .json();
        assert_eq!(names(by_author), vec!["Omelette"]);

        let (key, value) = auth_header(&bob);
        app.server
            .post(&format!("/api/recipes/{}/favorite", omelette))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::CREATED);
        let (key, value) = auth_header(&bob);
        app.server
            .post(&format!("/api/recipes/{}/shopping_cart", salad))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::CREATED);

        let (key, value) = auth_header(&bob);
        let favorites: ApiResponse<Value> = app
            .server
            .get("/api/recipes?is_favorited=1")
            .add_header(key, value)
            .await
            .json();
        assert_eq!(favorites.data["results"][0]["is_favorited"], true);
        assert_eq!(names(favorites), vec!["Omelette"]);

        let (key, value) = auth_header(&bob);
        let cart = app
            .server
            .get("/api/recipes?is_in_shopping_cart=true")
            .add_header(key, value)
            .await
            .json();
        assert_eq!(names(cart), vec!["Salad"]);

        let anonymous: ApiResponse<Value> =
            app.server.get("/api/recipes?is_favorited=1").await.json();
        assert_eq!(anonymous.data["count"], 0);
    }

    #[tokio::test]
    async fn test_only_author_may_modify_recipe() {
        let app = setup_test_app().await;
        let (_, owner) = app.user("owner").await;
        let (_, other) = app.user("other").await;
        let flour = app.ingredient("flour", "g").await;
        let sugar = app.ingredient("sugar", "g").await;
        let tag = app.tag("Dessert", "#AABBCC", "dessert").await;
        let cake = app.recipe(&owner, "Cake", &[(flour, 300)], &[tag]).await;

        let (key, value) = auth_header(&other);
        let response = app
            .server
            .patch(&format!("/api/recipes/{}", cake))
            .add_header(key, value)
            .json(&json!({"name": "Stolen cake"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: ErrorResponse = response.json();
        assert_eq!(error_code(&body), "PERMISSION_DENIED");

        let (key, value) = auth_header(&other);
        app.server
            .delete(&format!("/api/recipes/{}", cake))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (key, value) = auth_header(&owner);
        let updated = app
            .server
            .patch(&format!("/api/recipes/{}", cake))
            .add_header(key, value)
            .json(&json!({
                "name": "Sweet cake",
                "ingredients": [{"id": flour, "amount": 250}, {"id": sugar, "amount": 100}],
            }))
            .await;
        updated.assert_status_ok();
        let body: ApiResponse<Value> = updated.json();
        assert_eq!(body.data["name"], "Sweet cake");
        assert_eq!(body.data["ingredients"].as_array().unwrap().len(), 2);
        assert_eq!(body.data["tags"][0]["slug"], "dessert");

        let (key, value) = auth_header(&owner);
        app.server
            .delete(&format!("/api/recipes/{}", cake))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.server
            .get(&format!("/api/recipes/{}", cake))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_favorite_toggle() {
        let app = setup_test_app().await;
        let (_, token) = app.user("gourmet").await;
        let salt = app.ingredient("salt", "g").await;
        let tag = app.tag("Snack", "#123456", "snack").await;
        let chips = app.recipe(&token, "Chips", &[(salt, 2)], &[tag]).await;
        let path = format!("/api/recipes/{}/favorite", chips);

        let (key, value) = auth_header(&token);
        let added = app.server.post(&path).add_header(key, value).await;
        added.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = added.json();
        assert_eq!(body.data["id"], chips);
        assert_eq!(body.data["cooking_time"], 15);

        let (key, value) = auth_header(&token);
        app.server
            .post(&path)
            .add_header(key, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (key, value) = auth_header(&token);
        let detail: ApiResponse<Value> = app
            .server
            .get(&format!("/api/recipes/{}", chips))
            .add_header(key, value)
            .await
            .json();
        assert_eq!(detail.data["is_favorited"], true);

        let (key, value) = auth_header(&token);
        app.server
            .delete(&path)
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let (key, value) = auth_header(&token);
        app.server
            .delete(&path)
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let (key, value) = auth_header(&token);
        app.server
            .post("/api/recipes/9999/favorite")
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        app.server
            .post(&path)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_shopping_list_sums_shared_ingredients() {
        let app = setup_test_app().await;
        let (_, token) = app.user("shopper").await;
        let flour = app.ingredient("Флоур", "g").await;
        let milk = app.ingredient("milk", "ml").await;
        let tag = app.tag("Baking", "#FFF", "baking").await;

        let a = app.recipe(&token, "A", &[(flour, 200), (milk, 100)], &[tag]).await;
        let b = app.recipe(&token, "B", &[(flour, 300)], &[tag]).await;
        for recipe in [a, b] {
            let (key, value) = auth_header(&token);
            app.server
                .post(&format!("/api/recipes/{}/shopping_cart", recipe))
                .add_header(key, value)
                .await
                .assert_status(StatusCode::CREATED);
        }

        let (key, value) = auth_header(&token);
        app.server
            .post(&format!("/api/recipes/{}/shopping_cart", a))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (key, value) = auth_header(&token);
        let response = app
            .server
            .get("/api/recipes/download_shopping_cart")
            .add_header(key, value)
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.header(header::CONTENT_TYPE),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "attachment; filename=\"shopping_list.txt\""
        );
        let text = response.text();
        assert!(text.contains("Флоур (g) - 500\n"));
        assert!(text.contains("milk (ml) - 100\n"));
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_shopping_cart_edge_cases() {
        let app = setup_test_app().await;
        let (_, token) = app.user("minimalist").await;
        let salt = app.ingredient("salt", "g").await;
        let tag = app.tag("Misc", "#000000", "misc").await;
        let dish = app.recipe(&token, "Dish", &[(salt, 1)], &[tag]).await;

        let (key, value) = auth_header(&token);
        let empty = app
            .server
            .get("/api/recipes/download_shopping_cart")
            .add_header(key, value)
            .await;
        empty.assert_status_ok();
        assert_eq!(empty.text(), "");

        let (key, value) = auth_header(&token);
        app.server
            .delete(&format!("/api/recipes/{}/shopping_cart", dish))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        app.server
            .get("/api/recipes/download_shopping_cart")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_trailing_slash_routes() {
        let app = setup_test_app().await;
        let (author_id, _) = app.user("host").await;
        let (_, token) = app.user("guest").await;

        app.server.get("/api/recipes/").await.assert_status_ok();
        app.server.get("/api/tags/").await.assert_status_ok();
        app.server.get("/api/ingredients/").await.assert_status_ok();
        app.server.get("/api/users/").await.assert_status_ok();

        let (key, value) = auth_header(&token);
        let me: ApiResponse<Value> = app.server.get("/api/users/me/").add_header(key, value).await.json();
        assert_eq!(me.data["username"], "guest");

        let (key, value) = auth_header(&token);
        app.server
            .post(&format!("/api/users/{}/subscribe/", author_id))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::CREATED);

        let (key, value) = auth_header(&token);
        app.server
            .delete(&format!("/api/users/{}/subscribe/", author_id))
            .add_header(key, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_out_of_range_page_is_rejected() {
        let app = setup_test_app().await;
        let (_, token) = app.user("pager").await;

        for path in [
            "/api/users?page=18446744073709551615",
            "/api/recipes?page=18446744073709551615",
        ] {
            let response = app.server.get(path).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            let body: ErrorResponse = response.json();
            assert!(body.fields.unwrap().contains_key("page"));
        }

        let (key, value) = auth_header(&token);
        app.server
            .get("/api/users/subscriptions?page=18446744073709551615")
            .add_header(key, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let far: ApiResponse<Value> = app.server.get("/api/users?page=1000000").await.json();
        assert_eq!(far.data["count"], 1);
        assert!(far.data["results"].as_array().unwrap().is_empty());
        assert!(far.data["next"].is_null());
    }

    #[tokio::test]
    async fn test_ingredient_search_treats_wildcards_literally() {
        let app = setup_test_app().await;
        app.ingredient("apple", "pcs").await;
        app.ingredient("banana", "pcs").await;
        app.ingredient("50% cream", "ml").await;

        let wildcard: ApiResponse<Value> = app.server.get("/api/ingredients?name=%25").await.json();
        assert!(wildcard.data.as_array().unwrap().is_empty());

        let underscore: ApiResponse<Value> = app.server.get("/api/ingredients?name=_").await.json();
        assert!(underscore.data.as_array().unwrap().is_empty());

        let literal: ApiResponse<Value> = app.server.get("/api/ingredients?name=50%25").await.json();
        assert_eq!(literal.data.as_array().unwrap().len(), 1);
        assert_eq!(literal.data[0]["name"], "50% cream");
    }
}
