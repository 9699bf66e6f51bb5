use serde::Deserialize;
use sqlx::{types::Json, SqlitePool};

use crate::{
    appresult::{AppResult, FieldErrors},
    form::MultipartForm,
    media::check_images,
    models::{
        utc_now, Category, Condition, FurnishStatus, House, HouseStatus, ListedBy, PropertyType,
    },
};

const MIN_DESCRIPTION_CHARS: usize = 20;

/// Listing fields as submitted by a user or admin, before they become a row.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseDraft {
    pub category: Category,
    pub area_code: i64,
    pub location: String,
    pub address: String,
    pub size: f64,
    pub condition: Option<Condition>,
    pub bedrooms: i64,
    pub toilets: i64,
    pub bathrooms: i64,
    pub property_type: PropertyType,
    pub listed_by: ListedBy,
    pub furnish_status: FurnishStatus,
    pub facilities: Vec<String>,
    pub description: String,
    pub price: f64,
    pub negotiable: bool,
    pub parking_space: bool,
    pub video_url: Option<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HouseUpdate {
    pub category: Option<Category>,
    pub area_code: Option<i64>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub size: Option<f64>,
    pub condition: Option<Condition>,
    pub bedrooms: Option<i64>,
    pub toilets: Option<i64>,
    pub bathrooms: Option<i64>,
    pub property_type: Option<PropertyType>,
    pub listed_by: Option<ListedBy>,
    pub furnish_status: Option<FurnishStatus>,
    pub facilities: Option<Vec<String>>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub negotiable: Option<bool>,
    pub parking_space: Option<bool>,
    /// An empty string removes the video.
    pub video_url: Option<String>,
    pub status: Option<HouseStatus>,
}

impl HouseDraft {
    /// Range and length rules. Every failing field is reported.
    pub fn validate(&self, photo_count: usize) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(!self.location.trim().is_empty(), "location", "Required");
        errors.check(!self.address.trim().is_empty(), "address", "Required");
        errors.check(self.size.is_finite() && self.size > 0.0, "size", "Must be > 0");
        errors.check(self.bedrooms >= 0, "bedrooms", "Cannot be negative");
        errors.check(self.toilets >= 0, "toilets", "Cannot be negative");
        errors.check(self.bathrooms >= 0, "bathrooms", "Cannot be negative");
        errors.check(
            self.description.trim().chars().count() >= MIN_DESCRIPTION_CHARS,
            "description",
            "Must be at least 20 characters",
        );
        errors.check(self.price.is_finite() && self.price > 0.0, "price", "Must be > 0");
        errors.check(photo_count > 0, "photos", "At least one photo required");
        if let Some(url) = &self.video_url {
            errors.check(
                url.starts_with("http://") || url.starts_with("https://"),
                "video_url",
                "Must be an http(s) link",
            );
        }
        errors.check(
            self.facilities.iter().all(|f| !f.trim().is_empty()),
            "facilities",
            "Entries cannot be blank",
        );
        errors.into_result()
    }

    /// Parses the multipart listing form, including the `photos` files,
    /// and checks that the area exists.
    pub async fn from_form(form: &MultipartForm, db_pool: &SqlitePool) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        let photos = form.files("photos");
        check_images(&mut errors, "photos", photos);

        match Self::parse(form, &mut errors) {
            Some(draft) => {
                if let Err(range_errors) = draft.validate(photos.len()) {
                    errors.merge(range_errors);
                }
                if !area_exists(db_pool, draft.area_code).await? {
                    errors.add("area_code", "Unknown area");
                }
                errors.into_result()?;
                Ok(draft)
            }
            None => {
                errors.check(!photos.is_empty(), "photos", "At least one photo required");
                Err(errors.into())
            }
        }
    }

    fn parse(form: &MultipartForm, errors: &mut FieldErrors) -> Option<Self> {
        let category = form.required("category", errors);
        let area_code = form.required("area_code", errors);
        let location = form.required_text("location", errors);
        let address = form.required_text("address", errors);
        let size = form.required("size", errors);
        let condition = form.optional("condition", errors);
        let bedrooms = form.required("bedrooms", errors);
        let toilets = form.required("toilets", errors);
        let bathrooms = form.required("bathrooms", errors);
        let property_type = form.required("property_type", errors);
        let listed_by = form.optional("listed_by", errors).or(Some(ListedBy::Owner));
        let furnish_status = form.required("furnish_status", errors);
        let description = form.required_text("description", errors);
        let price = form.required("price", errors);
        let negotiable = form.flag("negotiable", errors);
        let parking_space = form.flag("parking_space", errors);
        let video_url = form.text("video_url").map(str::to_owned);

        let facilities = match form.text("facilities") {
            None => Some(Vec::new()),
            Some(raw) => match serde_json::from_str::<Vec<String>>(raw) {
                Ok(list) => Some(list),
                Err(_) => {
                    errors.add("facilities", "Must be a JSON list of strings");
                    None
                }
            },
        };

        Some(HouseDraft {
            category: category?,
            area_code: area_code?,
            location: location?,
            address: address?,
            size: size?,
            condition,
            bedrooms: bedrooms?,
            toilets: toilets?,
            bathrooms: bathrooms?,
            property_type: property_type?,
            listed_by: listed_by?,
            furnish_status: furnish_status?,
            facilities: facilities?,
            description: description?,
            price: price?,
            negotiable,
            parking_space,
            video_url,
        })
    }

    pub fn from_house(house: &House) -> Self {
        HouseDraft {
            category: house.category,
            area_code: house.area_code,
            location: house.location.clone(),
            address: house.address.clone(),
            size: house.size,
            condition: house.condition,
            bedrooms: house.bedrooms,
            toilets: house.toilets,
            bathrooms: house.bathrooms,
            property_type: house.property_type,
            listed_by: house.listed_by,
            furnish_status: house.furnish_status,
            facilities: house.facilities.0.clone(),
            description: house.description.clone(),
            price: house.price,
            negotiable: house.negotiable,
            parking_space: house.parking_space,
            video_url: house.video_url.clone(),
        }
    }

    /// Applies the update and returns the requested status change, if any.
    pub fn apply(&mut self, update: HouseUpdate) -> Option<HouseStatus> {
        let HouseUpdate {
            category,
            area_code,
            location,
            address,
            size,
            condition,
            bedrooms,
            toilets,
            bathrooms,
            property_type,
            listed_by,
            furnish_status,
            facilities,
            description,
            price,
            negotiable,
            parking_space,
            video_url,
            status,
        } = update;

        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut self.category, category);
        set(&mut self.area_code, area_code);
        set(&mut self.location, location);
        set(&mut self.address, address);
        set(&mut self.size, size);
        if condition.is_some() {
            self.condition = condition;
        }
        set(&mut self.bedrooms, bedrooms);
        set(&mut self.toilets, toilets);
        set(&mut self.bathrooms, bathrooms);
        set(&mut self.property_type, property_type);
        set(&mut self.listed_by, listed_by);
        set(&mut self.furnish_status, furnish_status);
        set(&mut self.facilities, facilities);
        set(&mut self.description, description);
        set(&mut self.price, price);
        set(&mut self.negotiable, negotiable);
        set(&mut self.parking_space, parking_space);
        if let Some(url) = video_url {
            let url = url.trim().to_owned();
            self.video_url = (!url.is_empty()).then_some(url);
        }
        status
    }

    pub async fn insert(
        &self,
        db_pool: &SqlitePool,
        owner_id: i64,
        assigned_admin_id: Option<i64>,
        image_urls: &[String],
    ) -> AppResult<House> {
        let house = sqlx::query_as(
            "INSERT INTO houses (category,area_code,location,address,size,condition,bedrooms,toilets,
                bathrooms,property_type,listed_by,furnish_status,facilities,description,price,negotiable,
                parking_space,status,image_urls,video_url,owner_id,assigned_admin_id,created_at)
             VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?) RETURNING *",
        )
        .bind(self.category)
        .bind(self.area_code)
        .bind(self.location.trim())
        .bind(self.address.trim())
        .bind(self.size)
        .bind(self.condition)
        .bind(self.bedrooms)
        .bind(self.toilets)
        .bind(self.bathrooms)
        .bind(self.property_type)
        .bind(self.listed_by)
        .bind(self.furnish_status)
        .bind(Json(&self.facilities))
        .bind(self.description.trim())
        .bind(self.price)
        .bind(self.negotiable)
        .bind(self.parking_space)
        .bind(HouseStatus::Pending)
        .bind(Json(image_urls))
        .bind(&self.video_url)
        .bind(owner_id)
        .bind(assigned_admin_id)
        .bind(utc_now())
        .fetch_one(db_pool)
        .await?;
        Ok(house)
    }

    pub async fn update(&self, db_pool: &SqlitePool, house_id: i64, status: HouseStatus) -> AppResult<House> {
        let house = sqlx::query_as(
            "UPDATE houses SET category=?,area_code=?,location=?,address=?,size=?,condition=?,bedrooms=?,
                toilets=?,bathrooms=?,property_type=?,listed_by=?,furnish_status=?,facilities=?,
                description=?,price=?,negotiable=?,parking_space=?,status=?,video_url=?
             WHERE id=? RETURNING *",
        )
        .bind(self.category)
        .bind(self.area_code)
        .bind(self.location.trim())
        .bind(self.address.trim())
        .bind(self.size)
        .bind(self.condition)
        .bind(self.bedrooms)
        .bind(self.toilets)
        .bind(self.bathrooms)
        .bind(self.property_type)
        .bind(self.listed_by)
        .bind(self.furnish_status)
        .bind(Json(&self.facilities))
        .bind(self.description.trim())
        .bind(self.price)
        .bind(self.negotiable)
        .bind(self.parking_space)
        .bind(status)
        .bind(&self.video_url)
        .bind(house_id)
        .fetch_one(db_pool)
        .await?;
        Ok(house)
    }
}

pub(crate) async fn area_exists(db_pool: &SqlitePool, area_code: i64) -> AppResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT code FROM areas WHERE code=?")
        .bind(area_code)
        .fetch_optional(db_pool)
        .await?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;

    use super::*;
    use crate::{appresult::AppError, db, form::UploadedFile};

    fn valid_draft() -> HouseDraft {
        HouseDraft {
            category: Category::Sell,
            area_code: 1,
            location: "Bole".to_owned(),
            address: "Around Edna Mall".to_owned(),
            size: 120.0,
            condition: Some(Condition::NewlyBuilt),
            bedrooms: 3,
            toilets: 2,
            bathrooms: 2,
            property_type: PropertyType::Apartment,
            listed_by: ListedBy::Owner,
            furnish_status: FurnishStatus::Furnished,
            facilities: vec!["gym".to_owned()],
            description: "Sunny three bedroom apartment near the mall".to_owned(),
            price: 250_000.0,
            negotiable: true,
            parking_space: true,
            video_url: None,
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert_eq!(valid_draft().validate(1), Ok(()));
    }

    #[test]
    fn size_and_description_errors_are_exactly_reported() {
        let mut draft = valid_draft();
        draft.size = 0.0;
        draft.description = "Too short".to_owned();

        let errors = draft.validate(1).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["description", "size"]);
    }

    #[test]
    fn negative_counts_and_missing_photos() {
        let mut draft = valid_draft();
        draft.bedrooms = -1;
        draft.price = -5.0;
        draft.video_url = Some("ftp://example.com/v.mp4".to_owned());

        let errors = draft.validate(0).unwrap_err();
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["bedrooms", "photos", "price", "video_url"]
        );

        let mut draft = valid_draft();
        draft.size = f64::INFINITY;
        draft.price = "inf".parse().unwrap();
        let errors = draft.validate(1).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["price", "size"]);

        draft.size = f64::NAN;
        draft.price = 1.0;
        assert!(draft.validate(1).unwrap_err().contains("size"));
    }

    #[test]
    fn updates_touch_only_given_fields() {
        let mut draft = valid_draft();
        let status = draft.apply(HouseUpdate {
            price: Some(300_000.0),
            video_url: Some(" ".to_owned()),
            status: Some(HouseStatus::Available),
            ..HouseUpdate::default()
        });

        assert_eq!(status, Some(HouseStatus::Available));
        assert_eq!(draft.price, 300_000.0);
        assert_eq!(draft.video_url, None);
        assert_eq!(draft.bedrooms, 3);
    }

    fn filled_form() -> MultipartForm {
        let mut form = MultipartForm::default();
        for (name, value) in [
            ("category", "rent"),
            ("area_code", "1"),
            ("location", "Bole"),
            ("address", "Around Edna Mall"),
            ("size", "0"),
            ("bedrooms", "3"),
            ("toilets", "1"),
            ("bathrooms", "1"),
            ("property_type", "condominium"),
            ("furnish_status", "semi_furnished"),
            ("description", "short"),
            ("price", "9000"),
            ("facilities", "[\"water\", \"generator\"]"),
        ] {
            form.push_text(name, value);
        }
        form.push_file(
            "photos",
            UploadedFile {
                file_name: "a.jpg".to_owned(),
                content_type: Some("image/jpeg".to_owned()),
                bytes: Bytes::from_static(b"jpg"),
            },
        );
        form
    }

    #[tokio::test]
    async fn form_reports_range_errors_and_unknown_area() {
        let db_pool = db::memory_pool().await.unwrap();

        let err = HouseDraft::from_form(&filled_form(), &db_pool).await.unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["area_code", "description", "size"]
        );
    }

    #[tokio::test]
    async fn form_parses_when_valid() {
        let db_pool = db::memory_pool().await.unwrap();
        sqlx::query("INSERT INTO areas (code,name) VALUES (1,'Bole')")
            .execute(&db_pool)
            .await
            .unwrap();

        let mut form = filled_form();
        form.push_text("size", "85.5");
        form.push_text("description", "Quiet condominium unit with a balcony");

        let draft = HouseDraft::from_form(&form, &db_pool).await.unwrap();
        assert_eq!(draft.category, Category::Rent);
        assert_eq!(draft.furnish_status, FurnishStatus::SemiFurnished);
        assert_eq!(draft.listed_by, ListedBy::Owner);
        assert_eq!(draft.facilities, vec!["water", "generator"]);
        assert!(!draft.negotiable);
    }

    #[tokio::test]
    async fn missing_fields_and_photos_are_listed() {
        let db_pool = db::memory_pool().await.unwrap();
        let mut form = MultipartForm::default();
        form.push_text("category", "sell");
        form.push_text("facilities", "not json");

        let err = HouseDraft::from_form(&form, &db_pool).await.unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for field in ["area_code", "size", "description", "price", "photos", "facilities"] {
            assert!(errors.contains(field), "{field} missing from {errors:?}");
        }
        assert!(!errors.contains("category"));
    }
}
