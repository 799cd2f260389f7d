//! Catalog browsing by voice: "select <category>", "select <product>", "enter", "exit"
//!
//! The browser keeps the selection and the open product, and registers itself
//! on the [`CommandBus`] under `select`, `enter` and `exit`.

use std::sync::{Arc, Mutex, PoisonError};

use crate::bus::CommandBus;
use crate::fuzzy::names_match;

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price: f64,
    pub delivery_days: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub products: Vec<Product>,
}

macro_rules! product {
    ($id:literal, $name:literal, $desc:literal, $price:literal, $days:literal) => {
        Product {
            id: $id,
            name: $name,
            description: $desc,
            price: $price,
            delivery_days: $days,
        }
    };
}

/// The storefront's built-in category list
pub fn default_catalog() -> Vec<Category> {
    vec![
        Category {
            id: "fashion-apparel",
            name: "Fashion and apparel",
            products: vec![
                product!("mens-clothing", "Men's clothing", "Stylish clothing for men", 49.99, 3),
                product!("womens-clothing", "Women's clothing", "Trendy clothing for women", 59.99, 3),
                product!("shoes", "Shoes", "Quality footwear for all occasions", 79.99, 4),
                product!("accessories", "Accessories", "Bags, watches, scarves, jewelry", 39.99, 2),
            ],
        },
        Category {
            id: "electronics-technology",
            name: "Electronics and technology",
            products: vec![
                product!("computers-laptops", "Computers and laptops", "High-performance computing devices", 899.99, 5),
                product!("mobile-phones", "Mobile phones and accessories", "Latest smartphones and accessories", 699.99, 3),
                product!("cameras-drones", "Cameras and drones", "Photography and videography equipment", 399.99, 4),
                product!("headphones-speakers", "Headphones and speakers", "Premium audio equipment", 149.99, 2),
                product!("video-games", "Video games and consoles", "Gaming systems and software", 299.99, 3),
            ],
        },
        Category {
            id: "home-kitchen",
            name: "Home and kitchen",
            products: vec![
                product!("furniture", "Furniture", "Quality furniture for every room", 299.99, 10),
                product!("home-decor", "Home décor", "Decorative items for your home", 49.99, 5),
                product!("cookware", "Cookware", "Professional-grade cooking equipment", 89.99, 4),
            ],
        },
        Category {
            id: "beauty-personal-care",
            name: "Beauty and personal care",
            products: vec![
                product!("skincare", "Skincare", "Premium skincare products", 59.99, 3),
                product!("makeup", "Makeup", "Cosmetics and beauty products", 39.99, 2),
                product!("fragrances", "Fragrances", "Luxury perfumes and colognes", 79.99, 4),
            ],
        },
        Category {
            id: "health-wellness",
            name: "Health and wellness",
            products: vec![
                product!("fitness-equipment", "Fitness equipment", "At-home gym gear", 199.99, 7),
                product!("supplements-vitamins", "Supplements and vitamins", "Health supplements and vitamins", 34.99, 3),
            ],
        },
        Category {
            id: "books-media-entertainment",
            name: "Books, media, and entertainment",
            products: vec![
                product!("books", "Books", "Physical and e-books", 19.99, 3),
                product!("movies-music", "Movies and music", "CDs, DVDs, Blu-rays", 24.99, 2),
                product!("toys-hobbies", "Toys and hobbies", "Toys and hobby supplies", 39.99, 4),
            ],
        },
        Category {
            id: "food-beverage",
            name: "Food and beverage",
            products: vec![
                product!("groceries", "Groceries", "Fresh groceries and essentials", 49.99, 1),
                product!("beverages", "Beverages", "Coffee, tea, juices", 19.99, 2),
            ],
        },
        Category {
            id: "sports-outdoors",
            name: "Sports and outdoors",
            products: vec![
                product!("camping-hiking", "Camping and hiking gear", "Outdoor adventure equipment", 129.99, 5),
                product!("athletic-apparel", "Athletic apparel and footwear", "Sports clothing and shoes", 89.99, 3),
            ],
        },
        Category {
            id: "baby-kids-pets",
            name: "Baby, kids, and pet products",
            products: vec![
                product!("baby-gear", "Baby gear", "Strollers, car seats, and baby equipment", 199.99, 5),
                product!("pet-food-treats", "Pet food and treats", "Nutritious food for pets", 29.99, 3),
            ],
        },
        Category {
            id: "diy-tools-industrial",
            name: "DIY, tools, and industrial",
            products: vec![
                product!("power-tools", "Power tools and hand tools", "Professional and DIY tools", 149.99, 4),
                product!("gardening-supplies", "Gardening supplies", "Everything for your garden", 49.99, 3),
            ],
        },
        Category {
            id: "automotive-parts",
            name: "Automotive and parts",
            products: vec![product!("car-parts-accessories", "Car parts and accessories", "Automotive parts and accessories", 79.99, 5)],
        },
        Category {
            id: "miscellaneous",
            name: "Miscellaneous",
            products: vec![
                product!("office-supplies", "Office supplies", "Essential office supplies", 29.99, 3),
                product!("gift-cards", "Gift cards", "Digital and physical gift cards", 25.00, 1),
            ],
        },
    ]
}

/// What a successful `select` picked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Category(&'static str),
    Product {
        category: &'static str,
        product: &'static str,
    },
}

#[derive(Debug)]
pub struct CategoryBrowser {
    categories: Vec<Category>,
    selected_category: Option<usize>,
    selected_product: Option<usize>,
    /// Product whose details are open
    open_product: Option<(usize, usize)>,
}

impl CategoryBrowser {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            selected_category: None,
            selected_product: None,
            open_product: None,
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn selected_category(&self) -> Option<&Category> {
        self.selected_category.map(|i| &self.categories[i])
    }

    pub fn selected_product(&self) -> Option<&Product> {
        let category = self.selected_category?;
        let product = self.selected_product?;
        self.categories[category].products.get(product)
    }

    pub fn open_product(&self) -> Option<&Product> {
        let (category, product) = self.open_product?;
        self.categories[category].products.get(product)
    }

    pub fn select_category(&mut self, name: &str) -> bool {
        match self.categories.iter().position(|c| names_match(name, c.name)) {
            Some(index) => {
                tracing::debug!(category = self.categories[index].id, "Selected category");
                self.selected_category = Some(index);
                self.selected_product = None;
                true
            }
            None => false,
        }
    }

    /// Look in the selected category first, then everywhere
    pub fn select_product(&mut self, name: &str) -> bool {
        if let Some(category) = self.selected_category {
            if let Some(index) = self.categories[category]
                .products
                .iter()
                .position(|p| names_match(name, p.name))
            {
                self.selected_product = Some(index);
                return true;
            }
        }

        for (category_index, category) in self.categories.iter().enumerate() {
            if let Some(index) = category.products.iter().position(|p| names_match(name, p.name)) {
                tracing::debug!(category = category.id, product = category.products[index].id, "Selected product");
                self.selected_category = Some(category_index);
                self.selected_product = Some(index);
                return true;
            }
        }
        false
    }

    /// Products of the current category, then categories, then any product
    pub fn select(&mut self, name: &str) -> Option<Selection> {
        let in_current = self.selected_category.is_some_and(|c| {
            self.categories[c]
                .products
                .iter()
                .any(|p| names_match(name, p.name))
        });

        let found = if in_current {
            self.select_product(name)
        } else {
            self.select_category(name) || self.select_product(name)
        };
        if !found {
            tracing::debug!(name, "Nothing in the catalog matches");
            return None;
        }

        let category = self.selected_category()?.id;
        Some(match self.selected_product() {
            Some(product) => Selection::Product {
                category,
                product: product.id,
            },
            None => Selection::Category(category),
        })
    }

    /// Open the selected product's details
    pub fn enter(&mut self) -> bool {
        match (self.selected_category, self.selected_product) {
            (Some(category), Some(product)) => {
                self.open_product = Some((category, product));
                true
            }
            _ => false,
        }
    }

    /// Close details and drop the product selection
    pub fn exit(&mut self) -> bool {
        let was_open = self.open_product.take().is_some();
        self.selected_product = None;
        was_open
    }

    /// Register `select`, `enter` and `exit` handlers on the bus
    pub fn register(browser: &Arc<Mutex<Self>>, bus: &mut CommandBus) {
        let select = Arc::clone(browser);
        bus.register("select", move |name| lock(&select).select(name).is_some());

        let enter = Arc::clone(browser);
        bus.register("enter", move |_| lock(&enter).enter());

        let exit = Arc::clone(browser);
        bus.register("exit", move |_| lock(&exit).exit());
    }
}

impl Default for CategoryBrowser {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

fn lock(browser: &Mutex<CategoryBrowser>) -> std::sync::MutexGuard<'_, CategoryBrowser> {
    browser.lock().unwrap_or_else(PoisonError::into_inner)
}
