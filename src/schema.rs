table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        password_hash -> Text,
        role -> Text,
        status -> Text,
        phone -> Nullable<Text>,
        created_at -> Text,
        email_verified -> Bool,
    }
}

table! {
    categories (id) {
        id -> Integer,
        name -> Text,
        slug -> Text,
        folder -> Text,
        is_active -> Bool,
        sort_order -> Integer,
        created_at -> Text,
    }
}

table! {
    sessions (id) {
        id -> Integer,
        token -> Text,
        user_id -> Integer,
        created_at -> Text,
        expires_at -> Text,
    }
}

table! {
    comments (id) {
        id -> Integer,
        category -> Text,
        post_filename -> Text,
        author_name -> Text,
        body -> Text,
        created_at -> Text,
    }
}

table! {
    stats (id) {
        id -> Integer,
        category -> Text,
        filename -> Text,
        views -> BigInt,
    }
}

joinable!(sessions -> users (user_id));

allow_tables_to_appear_in_same_query!(
    users,
    categories,
    sessions,
);
