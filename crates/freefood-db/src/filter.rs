use std::collections::HashMap;

use freefood_types::AllergenFlag;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::models::{AllergenRow, TaggedPost};
use crate::posts::{ALLERGEN_COLUMNS, placeholders, query_keyed_posts, tags_from_row};
use crate::{Database, Result};

impl Database {
    /// Tag sets that have every requested flag set to true. Flags that were
    /// not requested are unconstrained; an empty request matches every set.
    pub fn matching_tag_sets(&self, requested: &[AllergenFlag]) -> Result<Vec<AllergenRow>> {
        self.with_conn(|conn| query_matching_tag_sets(conn, requested))
    }

    /// One group per matching tag set, holding the posts linked to it. A
    /// post linked to several matching sets appears in each of their groups.
    pub fn filter_posts(&self, requested: &[AllergenFlag]) -> Result<Vec<Vec<TaggedPost>>> {
        self.with_conn(|conn| {
            let tag_sets = query_matching_tag_sets(conn, requested)?;
            debug!(flags = ?requested, matches = tag_sets.len(), "Filtering posts");

            if tag_sets.is_empty() {
                return Ok(vec![]);
            }

            let set_ids: Vec<i64> = tag_sets.iter().map(|set| set.id).collect();
            let tail = format!(
                "JOIN association a ON a.post_id = p.id
                 WHERE a.allergen_id IN ({})
                 ORDER BY a.allergen_id, p.id",
                placeholders(set_ids.len())
            );
            let mut groups: HashMap<i64, Vec<TaggedPost>> = HashMap::new();
            for (set_id, post) in
                query_keyed_posts(conn, "a.allergen_id", &tail, params_from_iter(&set_ids))?
            {
                groups.entry(set_id).or_default().push(post);
            }

            Ok(set_ids
                .iter()
                .map(|id| groups.remove(id).unwrap_or_default())
                .collect())
        })
    }
}

fn query_matching_tag_sets(
    conn: &Connection,
    requested: &[AllergenFlag],
) -> Result<Vec<AllergenRow>> {
    // Column names come from AllergenFlag, never from caller input.
    let mut sql = format!("SELECT id, {ALLERGEN_COLUMNS} FROM allergens");
    if !requested.is_empty() {
        let predicate: Vec<String> = requested
            .iter()
            .map(|flag| format!("{} = 1", flag.as_str()))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&predicate.join(" AND "));
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AllergenRow {
                id: row.get(0)?,
                tags: tags_from_row(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use freefood_types::AllergenTags;
    use freefood_types::api::NewPost;

    use super::*;
    use crate::UpdateMapping;

    fn post(user_id: i64, description: &str, allergens: AllergenTags) -> NewPost {
        NewPost {
            user_id,
            building: "Low".into(),
            room: "101".into(),
            description: description.into(),
            allergens,
        }
    }

    fn seeded() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let uid = db.create_user(Some("Alice")).unwrap().user.id;

        let pizza = AllergenTags::default()
            .with(AllergenFlag::Vegetarian)
            .with(AllergenFlag::NutFree)
            .with(AllergenFlag::FishFree)
            .with(AllergenFlag::ShellFree)
            .with(AllergenFlag::SoyFree);
        let salad = AllergenTags::default()
            .with(AllergenFlag::Vegan)
            .with(AllergenFlag::Vegetarian)
            .with(AllergenFlag::GlutenFree);

        let pizza_id = db.create_post(&post(uid, "pizza", pizza), None).unwrap().post.id;
        let salad_id = db.create_post(&post(uid, "salad", salad), None).unwrap().post.id;
        (db, pizza_id, salad_id)
    }

    fn ids(groups: &[Vec<TaggedPost>]) -> Vec<Vec<i64>> {
        groups
            .iter()
            .map(|g| g.iter().map(|p| p.post.id).collect())
            .collect()
    }

    #[test]
    fn single_flag_keeps_posts_with_extra_flags() {
        let (db, _pizza, salad) = seeded();
        let groups = db.filter_posts(&[AllergenFlag::Vegan]).unwrap();
        assert_eq!(ids(&groups), vec![vec![salad]]);
        assert!(groups[0][0].allergens[0].gluten_free);
    }

    #[test]
    fn flags_combine_with_and() {
        let (db, pizza, salad) = seeded();

        let groups = db
            .filter_posts(&[AllergenFlag::Vegetarian, AllergenFlag::NutFree])
            .unwrap();
        assert_eq!(ids(&groups), vec![vec![pizza]]);

        let groups = db.filter_posts(&[AllergenFlag::Vegetarian]).unwrap();
        assert_eq!(ids(&groups), vec![vec![pizza], vec![salad]]);

        let groups = db
            .filter_posts(&[AllergenFlag::Vegan, AllergenFlag::NutFree])
            .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn every_match_satisfies_the_request() {
        let (db, _, _) = seeded();
        let requested = [AllergenFlag::Vegetarian, AllergenFlag::SoyFree];
        for set in db.matching_tag_sets(&requested).unwrap() {
            assert!(set.tags.satisfies(&requested));
        }
    }

    #[test]
    fn no_flags_matches_every_tag_set() {
        let (db, pizza, salad) = seeded();
        let groups = db.filter_posts(&[]).unwrap();
        assert_eq!(ids(&groups), vec![vec![pizza], vec![salad]]);
    }

    #[test]
    fn update_leaves_no_empty_groups() {
        let (db, pizza, salad) = seeded();
        let current = db.get_post(pizza).unwrap();
        let uid = current.owner.id;

        let same = post(uid, "pizza", current.allergens[0]);
        db.update_post(pizza, &same, UpdateMapping::Legacy).unwrap();
        assert_eq!(ids(&db.filter_posts(&[]).unwrap()), vec![vec![salad], vec![pizza]]);

        let vegan = AllergenTags::default().with(AllergenFlag::Vegan);
        db.update_post(pizza, &post(uid, "pizza", vegan), UpdateMapping::Direct)
            .unwrap();
        assert!(db.filter_posts(&[AllergenFlag::NutFree]).unwrap().is_empty());
        assert_eq!(db.matching_tag_sets(&[]).unwrap().len(), 2);
    }

    #[test]
    fn deleted_post_leaves_empty_group() {
        let (db, pizza, salad) = seeded();
        db.delete_post(pizza).unwrap();

        let groups = db.filter_posts(&[AllergenFlag::Vegetarian]).unwrap();
        assert_eq!(ids(&groups), vec![vec![], vec![salad]]);
    }

    #[test]
    fn post_linked_to_two_matching_sets_appears_twice() {
        let (db, pizza, _) = seeded();
        db.with_tx(|conn| {
            conn.execute(
                "INSERT INTO allergens (vegetarian, nut_free) VALUES (1, 1)",
                [],
            )?;
            let extra = conn.last_insert_rowid();
            conn.execute(
                "INSERT INTO association (post_id, allergen_id) VALUES (?1, ?2)",
                [pizza, extra],
            )?;
            Ok(())
        })
        .unwrap();

        let groups = db.filter_posts(&[AllergenFlag::NutFree]).unwrap();
        assert_eq!(ids(&groups), vec![vec![pizza], vec![pizza]]);
        assert_eq!(groups[0][0].allergens.len(), 2);
    }
}
